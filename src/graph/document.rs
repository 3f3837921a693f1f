use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::{Map, Value as JsonValue};

use super::{CastContext, Graph, Node, parse_index};
use crate::core::{MapperError, NodeId, Result, Value, join_path, split_path};
use crate::relationship::Through;
use crate::schema::{EmbedTree, RelationKind, Schema};

/// Lazy loader for relations that were not embedded:
/// `(graph, owner, relation) -> raw related data`.
pub type FetchHandler = Arc<dyn Fn(&Graph, NodeId, &str) -> Result<JsonValue> + Send + Sync>;

#[derive(Clone, Default)]
pub struct GetOptions {
    pub fetch: Option<FetchHandler>,
}

impl GetOptions {
    pub fn fetch<F>(handler: F) -> Self
    where
        F: Fn(&Graph, NodeId, &str) -> Result<JsonValue> + Send + Sync + 'static,
    {
        Self {
            fetch: Some(Arc::new(handler)),
        }
    }
}

/// Relation filter used by dirty checks, exports and saves.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Embed {
    #[default]
    All,
    None,
    Paths(EmbedTree),
}

impl Embed {
    pub fn paths<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::Paths(EmbedTree::from_paths(paths)?))
    }

    pub fn allows(&self, relation: &str) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Paths(tree) => tree.contains(relation),
        }
    }

    /// Filter applied below `relation`.
    pub fn descend(&self, relation: &str) -> Embed {
        match self {
            Self::All => Self::All,
            Self::None => Self::None,
            Self::Paths(tree) => Self::Paths(tree.subtree(relation)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModifiedOptions {
    pub embed: Embed,
    /// Top-level fields left out of the comparison.
    pub ignore: Vec<String>,
}

impl Graph {
    // ========================================
    // Reads
    // ========================================

    pub fn get(&mut self, id: NodeId, path: &str) -> Result<Value> {
        self.get_with(id, path, &GetOptions::default())
    }

    /// Reads a dotted path. Intermediate nulls read as null; any other
    /// scalar on the way fails with `NotAnEntity`.
    pub fn get_with(&mut self, id: NodeId, path: &str, options: &GetOptions) -> Result<Value> {
        let segments = split_path(path)?;
        let mut current = Value::Node(id);
        for (i, segment) in segments.iter().enumerate() {
            current = match current {
                Value::Node(node) => self.get_segment(node, segment, options)?,
                Value::Through(through) => through.get_segment(self, segment)?,
                Value::Null => return Ok(Value::Null),
                _ => return Err(MapperError::NotAnEntity(segments[..i].join("."))),
            };
        }
        Ok(current)
    }

    pub(crate) fn get_segment(&mut self, id: NodeId, name: &str, options: &GetOptions) -> Result<Value> {
        if self.is_collection(id) {
            return self.item(id, parse_index(name)?);
        }
        self.get_field(id, name, options)
    }

    fn get_field(&mut self, id: NodeId, name: &str, options: &GetOptions) -> Result<Value> {
        let (schema, base_path, exists, stored) = {
            let doc = self.document(id)?;
            (
                doc.schema.clone(),
                doc.base_path.clone(),
                doc.exists,
                doc.data.get(name).cloned(),
            )
        };
        let path = join_path(base_path.as_deref(), name);
        let def = schema.field(&path).cloned();

        if let Some(def) = &def {
            if let Some(getter) = def.getter.clone() {
                let value = getter(self, id, stored.unwrap_or_default(), name)?;
                if def.is_virtual {
                    return Ok(value);
                }
                let ctx = self.context(id)?;
                return self.cast_field(schema, base_path.as_deref(), name, value, ctx);
            }
        }

        if let Some(value) = stored {
            return Ok(value);
        }

        if base_path.is_none() && schema.has_relation(name) {
            return self.get_relation(id, &schema, name, exists, options);
        }

        match def {
            Some(def) => {
                if let Some(default) = def.default {
                    return self.materialize(id, name, Value::from(default));
                }
                if def.is_array {
                    return self.materialize(id, name, Value::Json(JsonValue::Array(Vec::new())));
                }
                Ok(Value::Null)
            }
            None if schema.is_locked() => Err(MapperError::MissingFieldDefinition(
                schema.source().to_string(),
                path,
            )),
            None => Ok(Value::Null),
        }
    }

    fn get_relation(
        &mut self,
        id: NodeId,
        schema: &Arc<Schema>,
        name: &str,
        exists: bool,
        options: &GetOptions,
    ) -> Result<Value> {
        let relation = schema.relation(name)?;
        if relation.is_through() {
            let (through, using) = relation.through_parts()?;
            return Ok(Value::Through(Through::new(id, through, using)));
        }

        if let Some(fetch) = options.fetch.clone() {
            let raw = fetch(self, id, name)?;
            let ctx = CastContext {
                exists: true,
                collector: self.context(id)?.collector,
            };
            let value = self.cast_relation(schema, name, Value::from(raw), ctx)?;
            self.attach(id, name, value.clone())?;
            return Ok(value);
        }

        if !exists {
            let empty = match relation.kind {
                RelationKind::HasMany => Value::Json(JsonValue::Array(Vec::new())),
                _ => Value::Null,
            };
            return self.materialize(id, name, empty);
        }

        Err(MapperError::RelationNotEmbedded(
            schema.source().to_string(),
            name.to_string(),
        ))
    }

    /// Casts `raw` and stores it without raising events.
    fn materialize(&mut self, id: NodeId, name: &str, raw: Value) -> Result<Value> {
        let (schema, base_path) = {
            let doc = self.document(id)?;
            (doc.schema.clone(), doc.base_path.clone())
        };
        let value = self.loading(|graph| {
            let ctx = graph.context(id)?;
            graph.cast_field(schema, base_path.as_deref(), name, raw, ctx)
        })?;
        self.attach(id, name, value.clone())?;
        Ok(value)
    }

    /// Stores an already cast value as loaded state: no event, and the
    /// snapshot follows when the owner exists. A replaced node nothing else
    /// refers to is discarded.
    pub(crate) fn attach(&mut self, id: NodeId, name: &str, value: Value) -> Result<()> {
        let previous = self.document(id)?.data.get(name).cloned();
        if let Some(previous) = &previous {
            self.unlink(previous, id, name);
        }
        self.link(&value, id, name);
        let doc = self.document_mut(id)?;
        if doc.exists {
            doc.persisted.insert(name.to_string(), value.clone());
        }
        doc.data.insert(name.to_string(), value);
        match previous {
            Some(previous) => self.drop_orphan(&previous),
            None => Ok(()),
        }
    }

    /// Stored value without getters, defaults or relation checks.
    pub fn peek(&self, id: NodeId, name: &str) -> Result<Value> {
        match self.node(id)? {
            Node::Document(doc) => Ok(doc.data.get(name).cloned().unwrap_or_default()),
            Node::Collection(collection) => Ok(collection
                .items
                .get(parse_index(name)?)
                .cloned()
                .unwrap_or_default()),
        }
    }

    pub fn peek_path(&self, id: NodeId, path: &str) -> Result<Value> {
        let segments = split_path(path)?;
        let mut current = Value::Node(id);
        for (i, segment) in segments.iter().enumerate() {
            current = match current {
                Value::Node(node) => self.peek(node, segment)?,
                Value::Null => return Ok(Value::Null),
                _ => return Err(MapperError::NotAnEntity(segments[..i].join("."))),
            };
        }
        Ok(current)
    }

    /// True when `path` holds a stored value.
    pub fn has(&self, id: NodeId, path: &str) -> Result<bool> {
        let segments = split_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Ok(false);
        };
        let parent = if parents.is_empty() {
            Value::Node(id)
        } else {
            self.peek_path(id, &parents.join("."))?
        };
        let Value::Node(parent) = parent else {
            return Ok(false);
        };
        match self.node(parent)? {
            Node::Document(doc) => Ok(doc.data.contains_key(*last)),
            Node::Collection(collection) => Ok(last
                .parse::<usize>()
                .is_ok_and(|index| index < collection.items.len())),
        }
    }

    /// Primary key value. Fails when the kind has no key, or when a
    /// persisted entity lost its key.
    pub fn id(&self, id: NodeId) -> Result<Value> {
        let doc = self.document(id)?;
        let key = doc
            .schema
            .key()
            .ok_or_else(|| MapperError::MissingPrimaryKey(doc.schema.source().to_string()))?;
        let value = doc.data.get(key).cloned().unwrap_or_default();
        if value.is_null() && doc.exists {
            return Err(MapperError::MissingPrimaryKey(doc.schema.source().to_string()));
        }
        Ok(value)
    }

    pub fn exists(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.context().exists)
    }

    // ========================================
    // Writes
    // ========================================

    pub fn set(&mut self, id: NodeId, path: &str, value: impl Into<Value>) -> Result<()> {
        self.write(id, path, value.into(), true)
    }

    /// Sets every top-level entry of a JSON object.
    pub fn set_data(&mut self, id: NodeId, data: JsonValue) -> Result<()> {
        match data {
            JsonValue::Object(map) => {
                for (name, raw) in map {
                    self.write(id, &name, Value::from(raw), true)?;
                }
                Ok(())
            }
            other => Err(MapperError::TypeMismatch(format!(
                "Expected an object of fields, got {}",
                other
            ))),
        }
    }

    /// Writes a dotted path, creating missing intermediate documents.
    pub(crate) fn write(&mut self, id: NodeId, path: &str, value: Value, notify: bool) -> Result<()> {
        let segments = split_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(MapperError::InvalidPath(path.to_string()));
        };

        let mut target = Value::Node(id);
        for (i, segment) in parents.iter().enumerate() {
            target = match target {
                Value::Node(node) => {
                    let child = self.get_segment(node, segment, &GetOptions::default())?;
                    if child.is_null() && self.is_document(node) {
                        self.write(node, segment, Value::Json(JsonValue::Object(Map::new())), notify)?;
                        self.get_segment(node, segment, &GetOptions::default())?
                    } else {
                        child
                    }
                }
                Value::Through(through) => through.get_segment(self, segment)?,
                _ => return Err(MapperError::NotAnEntity(segments[..i].join("."))),
            };
        }

        match target {
            Value::Node(node) if self.is_collection(node) => {
                self.write_index(node, parse_index(last)?, value, notify)
            }
            Value::Node(node) => self.assign(node, last, value, notify),
            Value::Through(through) => through.set_segment(self, last, value),
            _ => Err(MapperError::NotAnEntity(parents.join("."))),
        }
    }

    /// Writes one field of a document: setter, cast, identity check, store,
    /// relink and notify.
    pub(crate) fn assign(&mut self, id: NodeId, name: &str, value: Value, notify: bool) -> Result<()> {
        let (schema, base_path) = {
            let doc = self.document(id)?;
            (doc.schema.clone(), doc.base_path.clone())
        };
        let path = join_path(base_path.as_deref(), name);
        let def = schema.field(&path).cloned();

        let mut value = value;
        if let Some(setter) = def.as_ref().and_then(|d| d.setter.clone()) {
            value = setter(self, id, value, name)?;
        }
        if def.as_ref().is_some_and(|d| d.is_virtual) {
            return Ok(());
        }

        let relation = match base_path {
            None if schema.has_relation(name) => Some(schema.relation(name)?.clone()),
            _ => None,
        };
        if let Some(relation) = &relation {
            if relation.is_through() {
                let (through, using) = relation.through_parts()?;
                return Through::new(id, through, using).replace(self, value);
            }
        }

        let ctx = self.context(id)?;
        let value = self.cast_field(schema.clone(), base_path.as_deref(), name, value, ctx)?;
        let previous = self.document(id)?.data.get(name).cloned();
        if previous.as_ref().is_some_and(|p| p.same(&value)) {
            return Ok(());
        }

        if let Some(previous) = &previous {
            self.unlink(previous, id, name);
        }
        self.link(&value, id, name);
        self.document_mut(id)?
            .data
            .insert(name.to_string(), value.clone());
        if notify {
            self.notify(id, name);
        }
        if let Some(previous) = &previous {
            self.drop_orphan(previous)?;
        }

        if let Some(relation) = relation.filter(|r| r.kind == RelationKind::BelongsTo) {
            let keys = relation.keys_or_err()?.clone();
            let key = match value.as_node() {
                Some(target) => self.peek(target, &keys.to)?,
                None => Value::Null,
            };
            self.write(id, &keys.from, key, notify)?;
        }
        if base_path.is_none() && schema.key() == Some(name) {
            self.register_identity(id)?;
        }
        Ok(())
    }

    /// Removes the value stored at `path`.
    pub fn unset(&mut self, id: NodeId, path: &str) -> Result<()> {
        let segments = split_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(MapperError::InvalidPath(path.to_string()));
        };
        let parent = if parents.is_empty() {
            Value::Node(id)
        } else {
            self.get(id, &parents.join("."))?
        };

        match parent {
            Value::Node(node) if self.is_collection(node) => {
                let removed = self.remove_index(node, parse_index(last)?)?;
                self.drop_orphan(&removed)
            }
            Value::Node(node) => self.remove_field(node, last),
            Value::Through(through) => through.unset(self, parse_index(last)?),
            Value::Null => Ok(()),
            _ => Err(MapperError::NotAnEntity(parents.join("."))),
        }
    }

    fn remove_field(&mut self, id: NodeId, name: &str) -> Result<()> {
        let Some(previous) = self.document_mut(id)?.data.shift_remove(name) else {
            return Ok(());
        };
        self.unlink(&previous, id, name);
        self.notify(id, name);
        self.drop_orphan(&previous)?;

        let doc = self.document(id)?;
        if doc.base_path.is_none() && doc.schema.key() == Some(name) {
            self.register_identity(id)?;
        }
        Ok(())
    }

    // ========================================
    // Dirty state
    // ========================================

    pub fn modified(&self, id: NodeId) -> Result<bool> {
        self.modified_with(id, &ModifiedOptions::default())
    }

    pub fn modified_with(&self, id: NodeId, options: &ModifiedOptions) -> Result<bool> {
        let mut visited = HashSet::new();
        self.is_modified(id, &options.embed, &options.ignore, &mut visited)
    }

    fn is_modified(
        &self,
        id: NodeId,
        embed: &Embed,
        ignore: &[String],
        visited: &mut HashSet<NodeId>,
    ) -> Result<bool> {
        if !visited.insert(id) {
            return Ok(false);
        }

        match self.node(id)? {
            Node::Document(doc) => {
                if !doc.exists {
                    return Ok(true);
                }
                let relation_level = doc.base_path.is_none();
                let is_relation = |name: &str| relation_level && doc.schema.has_relation(name);

                for (name, value) in &doc.data {
                    if ignore.contains(name) {
                        continue;
                    }
                    let relation = is_relation(name.as_str());
                    if relation && !embed.allows(name) {
                        continue;
                    }
                    match doc.persisted.get(name) {
                        Some(persisted) if persisted.same(value) => {}
                        _ => return Ok(true),
                    }
                    if let Value::Node(child) = value {
                        let nested = if relation { embed.descend(name) } else { embed.clone() };
                        if self.is_modified(*child, &nested, &[], visited)? {
                            return Ok(true);
                        }
                    }
                }

                let removed = doc.persisted.keys().any(|name| {
                    !doc.data.contains_key(name)
                        && !ignore.contains(name)
                        && (!is_relation(name.as_str()) || embed.allows(name))
                });
                Ok(removed)
            }
            Node::Collection(collection) => {
                if !collection.exists || collection.items.len() != collection.persisted.len() {
                    return Ok(true);
                }
                for (item, persisted) in collection.items.iter().zip(&collection.persisted) {
                    if !item.same(persisted) {
                        return Ok(true);
                    }
                    if let Value::Node(child) = item {
                        if self.is_modified(*child, embed, &[], visited)? {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
        }
    }

    /// Marks `id` and everything reachable from it as persisted.
    pub fn amend(&mut self, id: NodeId) -> Result<()> {
        let mut visited = HashSet::new();
        self.amend_node(id, true, &mut visited)
    }

    /// Writes `data` without raising events, then amends.
    pub fn amend_with(&mut self, id: NodeId, data: JsonValue) -> Result<()> {
        match data {
            JsonValue::Object(map) => {
                for (name, raw) in map {
                    self.write(id, &name, Value::from(raw), false)?;
                }
            }
            JsonValue::Null => {}
            other => {
                return Err(MapperError::TypeMismatch(format!(
                    "Expected an object of fields, got {}",
                    other
                )));
            }
        }
        self.amend(id)
    }

    /// Amends the record of `id` alone: its own fields and embedded plain
    /// values, leaving related entities untouched.
    pub(crate) fn amend_record(&mut self, id: NodeId) -> Result<()> {
        let mut visited = HashSet::new();
        self.amend_node(id, false, &mut visited)
    }

    fn amend_node(&mut self, id: NodeId, relations: bool, visited: &mut HashSet<NodeId>) -> Result<()> {
        if !visited.insert(id) {
            return Ok(());
        }

        let children: Vec<NodeId> = match self.node_mut(id)? {
            Node::Document(doc) => {
                doc.persisted = doc.data.clone();
                doc.exists = true;
                let relation_level = doc.base_path.is_none();
                doc.data
                    .iter()
                    .filter(|(name, _)| {
                        relations || !(relation_level && doc.schema.has_relation(name.as_str()))
                    })
                    .filter_map(|(_, value)| value.as_node())
                    .collect()
            }
            Node::Collection(collection) => {
                collection.persisted = collection.items.clone();
                collection.exists = true;
                if !relations && collection.base_path.is_none() {
                    Vec::new()
                } else {
                    collection.items.iter().filter_map(Value::as_node).collect()
                }
            }
        };

        for child in children {
            self.amend_node(child, relations, visited)?;
        }
        Ok(())
    }

    // ========================================
    // Relation hierarchy
    // ========================================

    /// Minimal dotted paths of every populated relation reachable from `id`.
    ///
    /// Pivot paths of `HasManyThrough` relations collapse to their alias.
    pub fn hierarchy(&self, id: NodeId) -> Result<Vec<String>> {
        let mut visited = HashSet::new();
        let mut paths = IndexSet::new();
        self.walk_hierarchy(id, "", &mut visited, &mut paths)?;

        let schema = self.schema_of(id)?;
        let mut collapsed = IndexSet::new();
        for path in paths {
            collapsed.insert(self.collapse_through(&schema, &path)?);
        }

        let minimal: Vec<String> = collapsed
            .iter()
            .filter(|path| {
                let prefix = format!("{}.", path);
                !collapsed.iter().any(|other| other.starts_with(&prefix))
            })
            .cloned()
            .collect();
        Ok(minimal)
    }

    /// Returns whether any path was produced below `id`.
    fn walk_hierarchy(
        &self,
        id: NodeId,
        prefix: &str,
        visited: &mut HashSet<NodeId>,
        paths: &mut IndexSet<String>,
    ) -> Result<bool> {
        if !visited.insert(id) {
            return Ok(false);
        }

        match self.node(id)? {
            Node::Collection(collection) => {
                let mut produced = false;
                for item in collection.items.iter().filter_map(Value::as_node) {
                    produced |= self.walk_hierarchy(item, prefix, visited, paths)?;
                }
                Ok(produced)
            }
            Node::Document(doc) => {
                if doc.base_path.is_some() {
                    return Ok(false);
                }
                let mut produced = false;
                for (name, value) in &doc.data {
                    if !doc.schema.has_relation(name) {
                        continue;
                    }
                    let path = join_path(Some(prefix), name);
                    let nested = match value {
                        Value::Node(child) => self.walk_hierarchy(*child, &path, visited, paths)?,
                        _ => false,
                    };
                    if !nested {
                        paths.insert(path);
                    }
                    produced = true;
                }
                Ok(produced)
            }
        }
    }

    /// Rewrites `pivot.target` segment pairs into the alias declaring them.
    fn collapse_through(&self, schema: &Arc<Schema>, path: &str) -> Result<String> {
        let segments = split_path(path)?;
        let mut collapsed = Vec::with_capacity(segments.len());
        let mut current = schema.clone();
        let mut i = 0;

        while i < segments.len() {
            let segment = segments[i];
            let alias = segments.get(i + 1).and_then(|next| {
                current.relations().find(|relation| {
                    relation.is_through()
                        && relation.through.as_deref() == Some(segment)
                        && relation.using.as_deref() == Some(*next)
                })
            });

            let next = match alias {
                Some(alias) => {
                    collapsed.push(alias.name.clone());
                    i += 2;
                    self.registry.target_of(alias)?
                }
                None if current.has_relation(segment) => {
                    collapsed.push(segment.to_string());
                    i += 1;
                    self.registry.target_of(current.relation(segment)?)?
                }
                None => {
                    collapsed.extend(segments[i..].iter().map(|s| s.to_string()));
                    break;
                }
            };
            current = next;
        }
        Ok(collapsed.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::schema::{FieldDef, Relation};
    use serde_json::json;

    fn graph() -> Graph {
        let mut registry = Registry::new();
        registry
            .register(
                Schema::new("users")
                    .column("id", FieldDef::new("id"))
                    .column("first", FieldDef::new("string"))
                    .column("last", FieldDef::new("string"))
                    .column("active", FieldDef::new("boolean").default(json!(true)))
                    .column("roles", FieldDef::new("string").array())
                    .column(
                        "full_name",
                        FieldDef::new("string")
                            .virtual_field()
                            .getter(|graph, id, _, _| {
                                let first = graph.peek(id, "first")?;
                                let last = graph.peek(id, "last")?;
                                Ok(Value::Text(format!("{} {}", first, last)))
                            })
                            .setter(|graph, id, value, _| {
                                let text = value.to_string();
                                let mut parts = text.splitn(2, ' ');
                                let first = parts.next().unwrap_or_default().to_string();
                                let last = parts.next().unwrap_or_default().to_string();
                                graph.set(id, "first", first)?;
                                graph.set(id, "last", last)?;
                                Ok(value)
                            }),
                    ),
            )
            .unwrap();
        Graph::new(Arc::new(registry))
    }

    #[test]
    fn test_getter_and_setter_on_virtual_field() {
        let mut graph = graph();
        let user = graph.create("users", json!({"id": 1})).unwrap();
        graph.set(user, "full_name", "Ada Lovelace").unwrap();

        assert_eq!(graph.get(user, "first").unwrap(), Value::from("Ada"));
        assert_eq!(graph.get(user, "full_name").unwrap(), Value::from("Ada Lovelace"));
        assert!(!graph.has(user, "full_name").unwrap());
    }

    #[test]
    fn test_default_is_materialized_without_dirtying() {
        let mut graph = graph();
        let user = graph.load("users", json!({"id": 1})).unwrap();
        assert!(!graph.has(user, "active").unwrap());
        assert_eq!(graph.get(user, "active").unwrap(), Value::Boolean(true));
        assert!(graph.has(user, "active").unwrap());
        assert!(!graph.modified(user).unwrap());
    }

    #[test]
    fn test_array_field_defaults_to_empty_collection() {
        let mut graph = graph();
        let user = graph.create("users", json!({"id": 1})).unwrap();
        let roles = graph.get(user, "roles").unwrap().as_node().unwrap();
        assert_eq!(graph.count(roles).unwrap(), 0);
        graph.push(roles, "admin").unwrap();
        assert_eq!(graph.get(user, "roles.0").unwrap(), Value::from("admin"));
    }

    #[test]
    fn test_modified_and_amend() {
        let mut graph = graph();
        let user = graph
            .load("users", json!({"id": 1, "first": "Ada", "roles": ["a"]}))
            .unwrap();
        assert!(!graph.modified(user).unwrap());

        graph.set(user, "roles.0", "b").unwrap();
        assert!(graph.modified(user).unwrap());
        graph.amend(user).unwrap();
        assert!(!graph.modified(user).unwrap());

        graph.unset(user, "first").unwrap();
        assert!(graph.modified(user).unwrap());
        let ignoring = ModifiedOptions {
            ignore: vec!["first".to_string()],
            ..Default::default()
        };
        assert!(!graph.modified_with(user, &ignoring).unwrap());
    }

    #[test]
    fn test_identical_write_is_a_noop() {
        let mut graph = graph();
        let user = graph.load("users", json!({"id": 1, "first": "Ada"})).unwrap();
        graph.set(user, "first", "Ada").unwrap();
        assert_eq!(graph.pending_events(), 0);
        assert!(!graph.modified(user).unwrap());

        graph.set(user, "id", "1").unwrap();
        assert_eq!(graph.pending_events(), 0);
    }

    #[test]
    fn test_id_rules() {
        let mut graph = graph();
        let user = graph.create("users", json!({})).unwrap();
        assert_eq!(graph.id(user).unwrap(), Value::Null);
        graph.amend(user).unwrap();
        assert!(matches!(graph.id(user), Err(MapperError::MissingPrimaryKey(_))));
    }

    #[test]
    fn test_scalar_intermediate_is_not_an_entity() {
        let mut graph = graph();
        let user = graph.create("users", json!({"id": 1, "first": "Ada"})).unwrap();
        assert!(matches!(
            graph.get(user, "first.size"),
            Err(MapperError::NotAnEntity(path)) if path == "first"
        ));
        assert!(matches!(graph.get(user, "first..size"), Err(MapperError::InvalidPath(_))));
    }
}
