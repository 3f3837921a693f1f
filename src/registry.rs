use std::collections::HashMap;
use std::sync::Arc;

use crate::MapperConfig;
use crate::core::{MapperError, Result};
use crate::provider::Provider;
use crate::schema::{RelationDescriptor, RelationKind, Schema};

/// Registry of entity kinds for one application.
///
/// Maps source names to schemas and storage providers. Build it once at
/// startup, then share it behind an `Arc` with every [`Graph`](crate::Graph).
/// Relations name their targets by source, so kinds can reference each other
/// in any registration order.
pub struct Registry {
    config: MapperConfig,
    schemas: HashMap<String, Arc<Schema>>,
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            config: MapperConfig::default(),
            schemas: HashMap::new(),
            providers: HashMap::new(),
        }
    }

    pub fn with_config(config: MapperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            schemas: HashMap::new(),
            providers: HashMap::new(),
        })
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Starts a schema carrying this registry's conventions.
    pub fn schema_builder(&self, source: &str) -> Schema {
        Schema::with_config(source, &self.config)
    }

    pub fn register(&mut self, schema: Schema) -> Result<Arc<Schema>> {
        schema.validate()?;
        let source = schema.source().to_string();
        if self.schemas.contains_key(&source) {
            return Err(MapperError::ConfigError(format!(
                "Schema '{}' already registered",
                source
            )));
        }
        let schema = Arc::new(schema);
        self.schemas.insert(source, schema.clone());
        Ok(schema)
    }

    pub fn unregister(&mut self, source: &str) -> Result<()> {
        self.providers.remove(source);
        self.schemas
            .remove(source)
            .map(|_| ())
            .ok_or_else(|| MapperError::SchemaNotFound(source.to_string()))
    }

    /// Drops every schema and provider.
    pub fn clear(&mut self) {
        self.schemas.clear();
        self.providers.clear();
    }

    pub fn schema(&self, source: &str) -> Result<Arc<Schema>> {
        self.schemas
            .get(source)
            .cloned()
            .ok_or_else(|| MapperError::SchemaNotFound(source.to_string()))
    }

    pub fn has_schema(&self, source: &str) -> bool {
        self.schemas.contains_key(source)
    }

    pub fn sources(&self) -> Vec<&str> {
        self.schemas.keys().map(|s| s.as_str()).collect()
    }

    pub fn provide(&mut self, source: &str, provider: Arc<dyn Provider>) {
        self.providers.insert(source.to_string(), provider);
    }

    pub fn provider(&self, source: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(source)
            .cloned()
            .ok_or_else(|| MapperError::ProviderNotFound(source.to_string()))
    }

    pub fn relation(&self, source: &str, name: &str) -> Result<RelationDescriptor> {
        Ok(self.schema(source)?.relation(name)?.clone())
    }

    /// Schema on the far side of `relation`. For `HasManyThrough` this is
    /// the target of the pivot's `using` relation.
    pub fn target_of(&self, relation: &RelationDescriptor) -> Result<Arc<Schema>> {
        if relation.is_through() {
            let (through, using) = relation.through_parts()?;
            let owner = self.schema(&relation.from)?;
            let pivot = self.target_of(owner.relation(through)?)?;
            return self.target_of(pivot.relation(using)?);
        }
        match &relation.to {
            Some(to) => self.schema(to),
            None => Err(MapperError::MissingRelation(
                relation.from.clone(),
                relation.name.clone(),
            )),
        }
    }

    /// The inverse of `relation` on its target schema.
    ///
    /// Fails with `AmbiguousCounterpart` when more than one relation on the
    /// far side matches.
    pub fn counterpart(&self, relation: &RelationDescriptor) -> Result<RelationDescriptor> {
        if relation.is_through() {
            return self.through_counterpart(relation);
        }

        let keys = relation.keys_or_err()?.swapped();
        let target = self.target_of(relation)?;
        let candidates: Vec<&RelationDescriptor> = target
            .relations()
            .filter(|candidate| {
                candidate.to.as_deref() == Some(relation.from.as_str())
                    && relation.kind.inverse_of(&candidate.kind)
                    && candidate.keys.as_ref() == Some(&keys)
            })
            .collect();

        self.single_counterpart(relation, candidates)
    }

    fn through_counterpart(&self, relation: &RelationDescriptor) -> Result<RelationDescriptor> {
        let (through, using) = relation.through_parts()?;
        let owner = self.schema(&relation.from)?;
        let pivot_relation = owner.relation(through)?;
        let pivot = self.target_of(pivot_relation)?;

        // pivot -> owner and target -> pivot
        let back_to_owner = self.counterpart(pivot_relation)?;
        let target_to_pivot = self.counterpart(pivot.relation(using)?)?;

        let target = self.target_of(relation)?;
        let candidates: Vec<&RelationDescriptor> = target
            .relations()
            .filter(|candidate| {
                candidate.kind == RelationKind::HasManyThrough
                    && candidate.through.as_deref() == Some(target_to_pivot.name.as_str())
                    && candidate.using.as_deref() == Some(back_to_owner.name.as_str())
            })
            .collect();

        self.single_counterpart(relation, candidates)
    }

    fn single_counterpart(
        &self,
        relation: &RelationDescriptor,
        candidates: Vec<&RelationDescriptor>,
    ) -> Result<RelationDescriptor> {
        match candidates.as_slice() {
            [single] => Ok((*single).clone()),
            [] => Err(MapperError::MissingRelation(
                relation.to.clone().unwrap_or_else(|| relation.from.clone()),
                format!("counterpart of '{}.{}'", relation.from, relation.name),
            )),
            many => Err(MapperError::AmbiguousCounterpart(
                relation.from.clone(),
                relation.name.clone(),
                many.iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
