//! Relation resolution, eager loading and the save cascade.
//!
//! `embed` loads the named relations of one entity or of every entity in a
//! collection with one provider call per relation, whatever the number of
//! owners. `save` walks the same relations to persist parents before and
//! children after the entity itself.

mod belongs_to;
mod has_many;
mod has_many_through;

pub use has_many_through::Through;

use std::collections::HashSet;
use std::sync::Arc;

use async_recursion::async_recursion;
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::{Instrument, Level, event, info_span};

use crate::core::{CollectorId, MapperError, NodeId, Result, Value};
use crate::graph::{Embed, Graph, ModifiedOptions};
use crate::provider::{DeleteRequest, FetchOptions, Query, SaveRequest};
use crate::registry::Registry;
use crate::schema::{EmbedTree, RelationDescriptor, RelationKind, Schema};

/// Options for [`Graph::embed_with`].
#[derive(Debug, Clone, Default)]
pub struct EmbedOptions {
    /// Forwarded untouched to every `Provider::all` call.
    pub fetch: FetchOptions,
    /// Shares loaded entities through one identity map for the whole load,
    /// whatever the unicity setting of their kind.
    pub unicity: bool,
    /// Identity map to load into.
    pub collector: Option<CollectorId>,
}

impl EmbedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn unicity(mut self, unicity: bool) -> Self {
        self.unicity = unicity;
        self
    }

    pub fn collector(mut self, collector: CollectorId) -> Self {
        self.collector = Some(collector);
        self
    }
}

/// Options for [`Graph::save_with`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Relations followed by the cascade.
    pub embed: Embed,
}

struct EmbedState {
    fetch: FetchOptions,
    shared: bool,
    collector: Option<CollectorId>,
}

impl Graph {
    // ========================================
    // Eager loading
    // ========================================

    pub async fn embed(&mut self, id: NodeId, relations: &[&str]) -> Result<()> {
        self.embed_with(id, relations, &EmbedOptions::default()).await
    }

    /// Loads `relations` (dotted paths, aliases allowed) for `id`, or for
    /// every entity of `id` when it is a collection.
    pub async fn embed_with(&mut self, id: NodeId, relations: &[&str], options: &EmbedOptions) -> Result<()> {
        let tree = EmbedTree::from_paths(relations)?;
        self.embed_tree(id, &tree, options).await
    }

    /// Same as [`Graph::embed_with`] for a tree that may carry per-relation
    /// fetch conditions.
    pub async fn embed_tree(&mut self, id: NodeId, tree: &EmbedTree, options: &EmbedOptions) -> Result<()> {
        let span = info_span!("graph.embed", node = %id, relations = ?tree.paths());
        self.embed_root(id, tree, options).instrument(span).await
    }

    async fn embed_root(&mut self, id: NodeId, tree: &EmbedTree, options: &EmbedOptions) -> Result<()> {
        let schema = self.schema_of(id)?;
        let owners: Vec<NodeId> = if self.is_collection(id) {
            self.values(id)?.iter().filter_map(Value::as_node).collect()
        } else {
            vec![id]
        };
        let tree = schema.treeify(self.registry(), tree)?;

        let mut state = EmbedState {
            fetch: options.fetch.clone(),
            shared: options.unicity || options.collector.is_some(),
            collector: options.collector,
        };
        let result = self.embed_level(schema, owners, tree, &mut state).await;
        if let Err(err) = &result {
            event!(Level::ERROR, error = %err, "embed failed");
        }
        self.flush_events();
        result
    }

    #[async_recursion(?Send)]
    async fn embed_level(
        &mut self,
        schema: Arc<Schema>,
        owners: Vec<NodeId>,
        tree: EmbedTree,
        state: &mut EmbedState,
    ) -> Result<()> {
        if owners.is_empty() {
            return Ok(());
        }

        for (name, node) in tree.iter() {
            let relation = schema.relation(name)?.clone();
            let target = self.registry().target_of(&relation)?;
            let collector = if state.shared || target.has_unicity() {
                Some(match state.collector {
                    Some(collector) => collector,
                    None => {
                        let collector = self.collector();
                        state.collector = Some(collector);
                        collector
                    }
                })
            } else {
                None
            };
            let load = Load {
                relation: &relation,
                target: &target,
                conditions: node.conditions.as_ref(),
                fetch: &state.fetch,
                collector,
            };

            let attached = match relation.kind {
                RelationKind::BelongsTo => belongs_to::embed(self, &owners, load).await?,
                RelationKind::HasOne | RelationKind::HasMany => has_many::embed(self, &owners, load).await?,
                RelationKind::HasManyThrough => {
                    return Err(MapperError::MissingRelation(
                        schema.source().to_string(),
                        format!("{} (alias must be embedded through its pivot)", name),
                    ));
                }
            };

            if !node.embed.is_empty() {
                self.embed_level(target.clone(), attached, node.embed.clone(), state)
                    .await?;
            }
        }
        Ok(())
    }

    // ========================================
    // Persistence
    // ========================================

    pub async fn save(&mut self, id: NodeId) -> Result<bool> {
        self.save_with(id, &SaveOptions::default()).await
    }

    /// Saves `id` and the relations allowed by `options.embed`. Returns
    /// whether `id` itself was written.
    pub async fn save_with(&mut self, id: NodeId, options: &SaveOptions) -> Result<bool> {
        let span = info_span!("graph.save", node = %id);
        self.save_root(id, options).instrument(span).await
    }

    async fn save_root(&mut self, id: NodeId, options: &SaveOptions) -> Result<bool> {
        let mut visited = HashSet::new();
        let result = self.save_node(id, &options.embed, &mut visited).await;
        match &result {
            Ok(saved) => event!(Level::DEBUG, saved = *saved, visited = visited.len(), "save finished"),
            Err(err) => event!(Level::ERROR, error = %err, "save failed"),
        }
        self.flush_events();
        result
    }

    #[async_recursion(?Send)]
    pub(crate) async fn save_node(
        &mut self,
        id: NodeId,
        embed: &Embed,
        visited: &mut HashSet<NodeId>,
    ) -> Result<bool> {
        if !visited.insert(id) {
            return Ok(false);
        }

        if self.is_collection(id) {
            let mut saved = false;
            let items: Vec<NodeId> = self.values(id)?.iter().filter_map(Value::as_node).collect();
            for item in items {
                saved |= self.save_node(item, embed, visited).await?;
            }
            self.amend_record(id)?;
            return Ok(saved);
        }

        // Embedded objects are written with their owner's record.
        if self.document(id)?.base_path.is_some() {
            return Ok(false);
        }

        let schema = self.schema_of(id)?;
        let relations: Vec<RelationDescriptor> = schema
            .relations()
            .filter(|relation| embed.allows(&relation.name))
            .cloned()
            .collect();

        for relation in relations.iter().filter(|r| r.kind == RelationKind::BelongsTo) {
            belongs_to::save_parent(self, id, relation, &embed.descend(&relation.name), visited)
                .await?;
        }

        let saved = self.save_record(id, &schema).await?;

        for relation in relations
            .iter()
            .filter(|r| matches!(r.kind, RelationKind::HasOne | RelationKind::HasMany))
        {
            has_many::save_children(self, id, relation, &embed.descend(&relation.name), visited)
                .await?;
        }
        Ok(saved)
    }

    /// Writes the entity's own record when it is new or modified.
    async fn save_record(&mut self, id: NodeId, schema: &Schema) -> Result<bool> {
        let shallow = ModifiedOptions {
            embed: Embed::None,
            ignore: Vec::new(),
        };
        if !self.modified_with(id, &shallow)? {
            return Ok(false);
        }

        let provider = self.registry().provider(schema.source())?;
        let key = match schema.key() {
            Some(field) => Some(self.peek(id, field)?)
                .filter(|key| !key.is_null())
                .map(|key| key.to_json()),
            None => None,
        };
        let request = SaveRequest {
            source: schema.source().to_string(),
            key_field: schema.key().map(str::to_string),
            key,
            exists: self.exists(id)?,
            data: self.export_datasource(id)?,
        };
        event!(
            Level::DEBUG,
            source = %request.source,
            exists = request.exists,
            "saving record"
        );

        let outcome = provider.save(request).await.map_err(|err| {
            event!(Level::ERROR, source = %schema.source(), error = %err, "provider save failed");
            err
        })?;
        if let (Some(key), Some(field)) = (outcome.key, schema.key()) {
            self.write(id, field, Value::from(key), true)?;
        }
        if outcome.saved {
            self.amend_record(id)?;
        }
        Ok(outcome.saved)
    }

    /// Deletes the entity's record. On success the entity no longer exists
    /// and leaves its identity map.
    pub async fn delete(&mut self, id: NodeId) -> Result<bool> {
        let span = info_span!("graph.delete", node = %id);
        self.delete_record(id).instrument(span).await
    }

    async fn delete_record(&mut self, id: NodeId) -> Result<bool> {
        let schema = self.schema_of(id)?;
        let key_field = schema
            .key()
            .ok_or_else(|| MapperError::MissingPrimaryKey(schema.source().to_string()))?;
        let key = self.id(id)?;
        if key.is_null() {
            return Err(MapperError::MissingPrimaryKey(schema.source().to_string()));
        }

        let provider = self.registry().provider(schema.source())?;
        let request = DeleteRequest {
            source: schema.source().to_string(),
            key_field: key_field.to_string(),
            key: key.to_json(),
        };
        let deleted = provider.delete(request).await.map_err(|err| {
            event!(Level::ERROR, source = %schema.source(), error = %err, "provider delete failed");
            err
        })?;

        if deleted {
            self.document_mut(id)?.exists = false;
            self.unregister_identity(id)?;
            event!(Level::DEBUG, source = %schema.source(), "record deleted");
        }
        self.flush_events();
        Ok(deleted)
    }
}

/// One relation being eager-loaded.
struct Load<'a> {
    relation: &'a RelationDescriptor,
    target: &'a Arc<Schema>,
    conditions: Option<&'a JsonValue>,
    fetch: &'a FetchOptions,
    collector: Option<CollectorId>,
}

/// Distinct, non-null values of `field` across `owners`, keyed loosely.
fn distinct_keys(graph: &Graph, owners: &[NodeId], field: &str) -> Result<IndexMap<String, JsonValue>> {
    let mut keys = IndexMap::new();
    for owner in owners {
        let value = graph.peek(*owner, field)?;
        if let Some(key) = value.index_key() {
            keys.entry(key).or_insert_with(|| value.to_json());
        }
    }
    Ok(keys)
}

/// Issues the single batched fetch of a relation. No keys, no call.
async fn fetch_rows(
    registry: &Registry,
    load: &Load<'_>,
    field: &str,
    keys: Vec<JsonValue>,
) -> Result<Vec<Map<String, JsonValue>>> {
    let relation = load.relation;
    if keys.is_empty() {
        event!(Level::DEBUG, relation = %relation.name, "no keys to load, fetch skipped");
        return Ok(Vec::new());
    }

    let source = load.target.source();
    let provider = registry.provider(source)?;
    let key_count = keys.len();
    let query = Query::new()
        .condition(field, JsonValue::Array(keys))
        .merge(relation.conditions.as_ref())
        .merge(load.conditions);
    event!(
        Level::DEBUG,
        relation = %relation.name,
        source = %source,
        keys = key_count,
        "fetching related rows"
    );

    let rows = provider
        .all(query, load.fetch.for_relation(&relation.name))
        .await
        .map_err(|err| {
            event!(Level::ERROR, relation = %relation.name, error = %err, "provider fetch failed");
            err
        })?;

    rows.into_iter()
        .map(|row| match row {
            JsonValue::Object(map) => Ok(map),
            other => Err(MapperError::Provider(format!(
                "Provider for '{}' returned a non-object row: {}",
                source, other
            ))),
        })
        .collect()
}
