//! Entity kind declarations.
//!
//! A [`Schema`] lists the field paths of one entity kind, its relations to
//! other kinds and the formatter tables used to cast input and export values.
//! Schemas are built once, registered in a [`Registry`](crate::Registry) and
//! shared behind an `Arc` afterwards.

mod field;
mod formatter;
mod paths;
mod relation;

pub use field::{FieldDef, Getter, Setter};
pub use formatter::{DEFAULT_HANDLER, FormatMode, FormatOptions, Formatter};
pub use paths::{EmbedNode, EmbedTree};
pub use relation::{Relation, RelationDescriptor, RelationKeys, RelationKind};

use std::sync::Arc;

use indexmap::IndexMap;

use crate::MapperConfig;
use crate::core::{MapperError, Result, Value, WILDCARD};
use formatter::FormatterTable;

#[derive(Clone)]
pub struct Schema {
    source: String,
    key: Option<String>,
    locked: bool,
    unicity: bool,
    fields: IndexMap<String, FieldDef>,
    relations: IndexMap<String, RelationDescriptor>,
    formatters: FormatterTable,
    config: MapperConfig,
}

impl Schema {
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_config(source, &MapperConfig::default())
    }

    pub fn with_config(source: impl Into<String>, config: &MapperConfig) -> Self {
        Self {
            source: source.into(),
            key: Some(config.key_field.clone()),
            locked: config.locked,
            unicity: config.unicity,
            fields: IndexMap::new(),
            relations: IndexMap::new(),
            formatters: formatter::default_formatters(),
            config: config.clone(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn has_unicity(&self) -> bool {
        self.unicity
    }

    // ========================================
    // Builder
    // ========================================

    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn without_primary_key(mut self) -> Self {
        self.key = None;
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn unicity(mut self, unicity: bool) -> Self {
        self.unicity = unicity;
        self
    }

    pub fn column(mut self, path: impl Into<String>, def: FieldDef) -> Self {
        self.fields.insert(path.into(), def);
        self
    }

    pub fn remove_column(mut self, path: &str) -> Self {
        self.fields.shift_remove(path);
        self
    }

    pub fn bind(mut self, name: impl Into<String>, relation: Relation) -> Self {
        let name = name.into();
        let from_key = self
            .key
            .clone()
            .unwrap_or_else(|| self.config.key_field.clone());
        let descriptor = relation.into_descriptor(&name, &self.source, &from_key, &self.config);
        self.relations.insert(name, descriptor);
        self
    }

    pub fn unbind(mut self, name: &str) -> Self {
        self.relations.shift_remove(name);
        self
    }

    /// Registers a formatter for `type_name` under `mode`. Use
    /// [`DEFAULT_HANDLER`] as the type to replace the fallback handler.
    pub fn formatter<F>(mut self, mode: FormatMode, type_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value, &FormatOptions) -> Result<Value> + Send + Sync + 'static,
    {
        self.formatters
            .entry(mode)
            .or_default()
            .insert(type_name.into(), Arc::new(handler));
        self
    }

    /// Checks that no relation name shadows a plain field declaration.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self.relations.keys().find(|name| self.fields.contains_key(*name)) {
            return Err(MapperError::ConfigError(format!(
                "Relation '{}' on '{}' collides with a field definition",
                name, self.source
            )));
        }
        if let Some(path) = self.fields.keys().find(|p| crate::core::split_path(p).is_err()) {
            return Err(MapperError::InvalidPath(path.clone()));
        }
        Ok(())
    }

    // ========================================
    // Fields
    // ========================================

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.fields.iter()
    }

    pub fn has_field(&self, path: &str) -> bool {
        self.field(path).is_some()
    }

    /// Resolves the most specific declaration for `path`: the exact path
    /// first, then the wildcard pattern with the fewest `*` segments.
    pub fn field(&self, path: &str) -> Option<&FieldDef> {
        if let Some(def) = self.fields.get(path) {
            return Some(def);
        }

        let segments: Vec<&str> = path.split('.').collect();
        self.fields
            .iter()
            .filter_map(|(pattern, def)| {
                let parts: Vec<&str> = pattern.split('.').collect();
                if parts.len() != segments.len() {
                    return None;
                }
                let mut wildcards = 0;
                for (part, segment) in parts.iter().zip(segments.iter()) {
                    if *part == WILDCARD {
                        wildcards += 1;
                    } else if part != segment {
                        return None;
                    }
                }
                Some((wildcards, def))
            })
            .min_by_key(|(wildcards, _)| *wildcards)
            .map(|(_, def)| def)
    }

    // ========================================
    // Relations
    // ========================================

    pub fn relations(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations.values()
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &String> {
        self.relations.keys()
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn relation(&self, name: &str) -> Result<&RelationDescriptor> {
        self.relations
            .get(name)
            .ok_or_else(|| MapperError::MissingRelation(self.source.clone(), name.to_string()))
    }

    // ========================================
    // Formatting
    // ========================================

    fn handler(&self, mode: FormatMode, type_name: &str) -> Option<&Formatter> {
        let table = self.formatters.get(&mode)?;
        table.get(type_name).or_else(|| table.get(DEFAULT_HANDLER))
    }

    /// Applies the `mode` handler for `type_name` to a scalar. Unknown types
    /// pass through unchanged and nulls are never formatted.
    pub fn convert(&self, mode: FormatMode, type_name: &str, path: &str, value: Value) -> Result<Value> {
        if value.is_null() || value.is_entity() {
            return Ok(value);
        }
        match self.handler(mode, type_name) {
            Some(handler) => handler(
                &value,
                &FormatOptions {
                    path: path.to_string(),
                    type_name: type_name.to_string(),
                },
            ),
            None => Ok(value),
        }
    }

    /// Formats a scalar stored at `path` for export.
    pub fn format(&self, mode: FormatMode, path: &str, value: Value) -> Result<Value> {
        let type_name = match self.field(path) {
            Some(def) => def.type_name.clone(),
            None => value.type_name().to_string(),
        };
        self.convert(mode, &type_name, path, value)
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("source", &self.source)
            .field("key", &self.key)
            .field("locked", &self.locked)
            .field("unicity", &self.unicity)
            .field("fields", &self.fields)
            .field("relations", &self.relations)
            .finish()
    }
}
