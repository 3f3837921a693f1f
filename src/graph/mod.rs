//! Arena of documents and collections.
//!
//! Every entity lives in a [`Graph`] and is addressed by a copyable
//! [`NodeId`]. Children record their parents as `(NodeId, field)` links, so
//! back-references never own anything and cyclic relation graphs are plain
//! data. The graph also owns the identity maps and the pending modification
//! events.

mod collection;
mod document;
mod events;
mod export;

pub use document::{Embed, FetchHandler, GetOptions, ModifiedOptions};
pub use events::ModifiedEvent;
pub use export::ExportOptions;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::collector::{Collector, identity_key};
use crate::core::{CollectorId, MapperError, NodeId, ParentLink, Result, Value, WILDCARD, join_path};
use crate::registry::Registry;
use crate::schema::{FormatMode, Schema};
use events::EventQueue;

#[derive(Debug, Clone)]
pub(crate) struct DocumentNode {
    pub(crate) schema: Arc<Schema>,
    /// Path of this document inside its owner's record, `None` for entities.
    pub(crate) base_path: Option<String>,
    pub(crate) data: IndexMap<String, Value>,
    pub(crate) persisted: IndexMap<String, Value>,
    pub(crate) parents: IndexSet<ParentLink>,
    pub(crate) exists: bool,
    pub(crate) collector: Option<CollectorId>,
    pub(crate) identity: Option<Uuid>,
    /// Built by `create`/`load`: only an explicit `discard` drops it.
    pub(crate) root: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct CollectionNode {
    /// `None` for untyped scalar lists.
    pub(crate) schema: Option<Arc<Schema>>,
    /// Field path for embedded arrays, `None` for relation collections.
    pub(crate) base_path: Option<String>,
    pub(crate) items: Vec<Value>,
    pub(crate) persisted: Vec<Value>,
    pub(crate) parents: IndexSet<ParentLink>,
    pub(crate) exists: bool,
    pub(crate) collector: Option<CollectorId>,
    pub(crate) root: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Document(DocumentNode),
    Collection(CollectionNode),
}

impl Node {
    fn parents(&self) -> &IndexSet<ParentLink> {
        match self {
            Node::Document(doc) => &doc.parents,
            Node::Collection(collection) => &collection.parents,
        }
    }

    fn parents_mut(&mut self) -> &mut IndexSet<ParentLink> {
        match self {
            Node::Document(doc) => &mut doc.parents,
            Node::Collection(collection) => &mut collection.parents,
        }
    }

    fn is_root(&self) -> bool {
        match self {
            Node::Document(doc) => doc.root,
            Node::Collection(collection) => collection.root,
        }
    }

    fn mark_root(&mut self) {
        match self {
            Node::Document(doc) => doc.root = true,
            Node::Collection(collection) => collection.root = true,
        }
    }

    fn schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Node::Document(doc) => Some(&doc.schema),
            Node::Collection(collection) => collection.schema.as_ref(),
        }
    }

    fn context(&self) -> CastContext {
        match self {
            Node::Document(doc) => CastContext {
                exists: doc.exists,
                collector: doc.collector,
            },
            Node::Collection(collection) => CastContext {
                exists: collection.exists,
                collector: collection.collector,
            },
        }
    }
}

/// State inherited by every node built while casting raw data.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CastContext {
    pub(crate) exists: bool,
    pub(crate) collector: Option<CollectorId>,
}

/// Options for [`Graph::create_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Marks the built nodes as loaded from the store.
    pub exists: bool,
    /// Identity map shared by the built entities.
    pub collector: Option<CollectorId>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(mut self, exists: bool) -> Self {
        self.exists = exists;
        self
    }

    pub fn collector(mut self, collector: CollectorId) -> Self {
        self.collector = Some(collector);
        self
    }
}

pub struct Graph {
    registry: Arc<Registry>,
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    collectors: Vec<Collector>,
    events: EventQueue,
    /// Depth of nested loads; see [`Graph::context`].
    loading: usize,
}

impl Graph {
    pub fn new(registry: Arc<Registry>) -> Self {
        let capacity = registry.config().event_capacity;
        Self {
            registry,
            nodes: HashMap::new(),
            next_id: 1,
            collectors: Vec::new(),
            events: EventQueue::new(capacity),
            loading: 0,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn is_collection(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(&id), Some(Node::Collection(_)))
    }

    pub fn is_document(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(&id), Some(Node::Document(_)))
    }

    /// Schema bound to a document or a typed collection.
    pub fn schema_of(&self, id: NodeId) -> Result<Arc<Schema>> {
        self.node(id)?
            .schema()
            .cloned()
            .ok_or_else(|| MapperError::NotAnEntity(id.to_string()))
    }

    pub fn parents(&self, id: NodeId) -> Result<Vec<ParentLink>> {
        Ok(self.node(id)?.parents().iter().cloned().collect())
    }

    // ========================================
    // Identity maps
    // ========================================

    /// Opens a fresh identity map.
    pub fn collector(&mut self) -> CollectorId {
        self.collectors.push(Collector::new());
        CollectorId(self.collectors.len() - 1)
    }

    pub fn collector_len(&self, collector: CollectorId) -> usize {
        self.collectors
            .get(collector.0)
            .map(Collector::len)
            .unwrap_or(0)
    }

    /// Live entity registered for `source` and `key` in `collector`.
    pub fn lookup(&self, collector: CollectorId, source: &str, key: &Value) -> Option<NodeId> {
        let identity = identity_key(source, key)?;
        self.collectors
            .get(collector.0)?
            .get(&identity)
            .filter(|id| self.nodes.contains_key(id))
    }

    fn collector_hit(
        &mut self,
        schema: &Schema,
        data: &Map<String, JsonValue>,
        ctx: CastContext,
    ) -> Result<Option<NodeId>> {
        let (Some(collector), Some(key_field)) = (ctx.collector, schema.key()) else {
            return Ok(None);
        };
        let Some(key) = data.get(key_field) else {
            return Ok(None);
        };
        let Some(existing) = self.lookup(collector, schema.source(), &Value::from(key.clone()))
        else {
            return Ok(None);
        };
        self.fill_missing(existing, data)?;
        Ok(Some(existing))
    }

    /// Adds the fields `existing` lacks; fields already held are left alone.
    fn fill_missing(&mut self, existing: NodeId, data: &Map<String, JsonValue>) -> Result<()> {
        self.loading(|graph| {
            for (name, raw) in data {
                if graph.document(existing)?.data.contains_key(name) {
                    continue;
                }
                graph.assign(existing, name, Value::from(raw.clone()), false)?;
                let doc = graph.document_mut(existing)?;
                if doc.exists {
                    if let Some(value) = doc.data.get(name).cloned() {
                        doc.persisted.insert(name.clone(), value);
                    }
                }
            }
            Ok(())
        })
    }

    pub(crate) fn register_identity(&mut self, id: NodeId) -> Result<()> {
        let doc = self.document(id)?;
        let Some(collector) = doc.collector else {
            return Ok(());
        };
        let previous = doc.identity;
        let current = doc
            .schema
            .key()
            .and_then(|key| doc.data.get(key))
            .and_then(|key| identity_key(doc.schema.source(), key));
        if previous == current {
            return Ok(());
        }

        if let Some(map) = self.collectors.get_mut(collector.0) {
            if let Some(previous) = previous {
                map.remove(&previous, id);
            }
            if let Some(current) = current {
                map.set(current, id);
            }
        }
        self.document_mut(id)?.identity = current;
        Ok(())
    }

    pub(crate) fn unregister_identity(&mut self, id: NodeId) -> Result<()> {
        let doc = self.document_mut(id)?;
        let (Some(collector), Some(identity)) = (doc.collector, doc.identity.take()) else {
            return Ok(());
        };
        if let Some(map) = self.collectors.get_mut(collector.0) {
            map.remove(&identity, id);
        }
        Ok(())
    }

    // ========================================
    // Construction
    // ========================================

    /// Builds a new, not yet persisted entity of kind `source`.
    pub fn create(&mut self, source: &str, data: JsonValue) -> Result<NodeId> {
        self.create_with(source, data, CreateOptions::default())
    }

    /// Builds an entity from a stored row; it starts unmodified.
    pub fn load(&mut self, source: &str, data: JsonValue) -> Result<NodeId> {
        self.create_with(source, data, CreateOptions::new().exists(true))
    }

    /// An object builds a document, an array a collection of documents.
    pub fn create_with(&mut self, source: &str, data: JsonValue, options: CreateOptions) -> Result<NodeId> {
        let schema = self.registry.schema(source)?;
        let ctx = CastContext {
            exists: options.exists,
            collector: options.collector,
        };
        let id = match data {
            JsonValue::Object(map) => self.build_document(schema, None, map, ctx)?,
            JsonValue::Null => self.build_document(schema, None, Map::new(), ctx)?,
            JsonValue::Array(items) => {
                let items = items.into_iter().map(Value::from).collect();
                self.build_collection(Some(schema), None, items, ctx)?
            }
            other => {
                return Err(MapperError::TypeMismatch(format!(
                    "Cannot build '{}' from {}",
                    source, other
                )));
            }
        };
        self.node_mut(id)?.mark_root();
        Ok(id)
    }

    /// Builds a collection of `source` entities, or an untyped list when
    /// `source` is `None`.
    pub fn create_collection(
        &mut self,
        source: Option<&str>,
        items: Vec<JsonValue>,
        options: CreateOptions,
    ) -> Result<NodeId> {
        let schema = source.map(|s| self.registry.schema(s)).transpose()?;
        let ctx = CastContext {
            exists: options.exists,
            collector: options.collector,
        };
        let items = items.into_iter().map(Value::from).collect();
        let id = self.build_collection(schema, None, items, ctx)?;
        self.node_mut(id)?.mark_root();
        Ok(id)
    }

    /// Drops a node from the arena. Children it built that nothing else
    /// refers to go with it.
    pub fn discard(&mut self, id: NodeId) -> Result<()> {
        if self.is_document(id) {
            self.unregister_identity(id)?;
        }
        let node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| MapperError::NodeNotFound(id.to_string()))?;
        let children: IndexSet<NodeId> = match &node {
            Node::Document(doc) => doc.data.values().filter_map(Value::as_node).collect(),
            Node::Collection(collection) => {
                collection.items.iter().filter_map(Value::as_node).collect()
            }
        };
        for child in children {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parents_mut().retain(|link| link.parent != id);
            }
            self.drop_orphan(&Value::Node(child))?;
        }
        Ok(())
    }

    /// Discards `value` when it is a built node no parent refers to.
    pub(crate) fn drop_orphan(&mut self, value: &Value) -> Result<()> {
        let Value::Node(id) = value else {
            return Ok(());
        };
        let orphan = self
            .nodes
            .get(id)
            .is_some_and(|node| !node.is_root() && node.parents().is_empty());
        if orphan {
            self.discard(*id)?;
        }
        Ok(())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    pub(crate) fn build_document(
        &mut self,
        schema: Arc<Schema>,
        base_path: Option<String>,
        data: Map<String, JsonValue>,
        ctx: CastContext,
    ) -> Result<NodeId> {
        let is_entity = base_path.is_none();
        if is_entity {
            if let Some(existing) = self.collector_hit(&schema, &data, ctx)? {
                return Ok(existing);
            }
        }

        let id = self.alloc(Node::Document(DocumentNode {
            schema,
            base_path,
            data: IndexMap::new(),
            persisted: IndexMap::new(),
            parents: IndexSet::new(),
            exists: ctx.exists,
            collector: if is_entity { ctx.collector } else { None },
            identity: None,
            root: false,
        }));

        let built = self.loading(|graph| {
            for (name, raw) in data {
                graph.write(id, &name, Value::from(raw), false)?;
            }
            Ok(())
        });
        if let Err(err) = built {
            self.discard(id)?;
            return Err(err);
        }
        if ctx.exists {
            let doc = self.document_mut(id)?;
            doc.persisted = doc.data.clone();
        }
        Ok(id)
    }

    pub(crate) fn build_collection(
        &mut self,
        schema: Option<Arc<Schema>>,
        base_path: Option<String>,
        items: Vec<Value>,
        ctx: CastContext,
    ) -> Result<NodeId> {
        let id = self.alloc(Node::Collection(CollectionNode {
            schema,
            base_path,
            items: Vec::with_capacity(items.len()),
            persisted: Vec::new(),
            parents: IndexSet::new(),
            exists: ctx.exists,
            collector: ctx.collector,
            root: false,
        }));

        let built = self.loading(|graph| {
            for item in items {
                let value = graph.cast_item(id, item)?;
                graph.link(&value, id, WILDCARD);
                graph.collection_mut(id)?.items.push(value);
            }
            Ok(())
        });
        if let Err(err) = built {
            self.discard(id)?;
            return Err(err);
        }
        if ctx.exists {
            let collection = self.collection_mut(id)?;
            collection.persisted = collection.items.clone();
        }
        Ok(id)
    }

    // ========================================
    // Casting
    // ========================================

    /// Context for values cast into `id`.
    ///
    /// Nodes built while `id` itself is being loaded share its stored state.
    /// Any later write builds new, unsaved nodes.
    pub(crate) fn context(&self, id: NodeId) -> Result<CastContext> {
        let mut ctx = self.node(id)?.context();
        ctx.exists &= self.loading > 0;
        Ok(ctx)
    }

    /// Runs `f` as part of a load: nested casts inherit the stored state of
    /// the node they are written into.
    pub(crate) fn loading<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.loading += 1;
        let result = f(self);
        self.loading -= 1;
        result
    }

    /// Casts a raw value written to `name` of a document.
    pub(crate) fn cast_field(
        &mut self,
        schema: Arc<Schema>,
        base_path: Option<&str>,
        name: &str,
        value: Value,
        ctx: CastContext,
    ) -> Result<Value> {
        if value.is_entity() {
            return Ok(value);
        }
        if base_path.is_none() && schema.has_relation(name) {
            return self.cast_relation(&schema, name, value, ctx);
        }

        let path = join_path(base_path, name);
        let def = schema.field(&path).cloned();
        match def {
            Some(def) if def.is_array => match value {
                Value::Null => Ok(Value::Null),
                Value::Json(JsonValue::Array(items)) => {
                    let items = items.into_iter().map(Value::from).collect();
                    self.build_collection(Some(schema), Some(path), items, ctx)
                        .map(Value::Node)
                }
                other => Err(MapperError::TypeMismatch(format!(
                    "Field '{}' on '{}' expects an array, got {}",
                    path,
                    schema.source(),
                    other.type_name()
                ))),
            },
            Some(def) if def.is_object() => match value {
                Value::Null => Ok(Value::Null),
                Value::Json(JsonValue::Object(map)) => self
                    .build_document(schema, Some(path), map, ctx)
                    .map(Value::Node),
                other => Err(MapperError::TypeMismatch(format!(
                    "Field '{}' on '{}' expects an object, got {}",
                    path,
                    schema.source(),
                    other.type_name()
                ))),
            },
            Some(def) => schema.convert(FormatMode::Cast, &def.type_name, &path, value),
            None if schema.is_locked() => Err(MapperError::MissingFieldDefinition(
                schema.source().to_string(),
                path,
            )),
            None => match value {
                Value::Json(JsonValue::Object(map)) => self
                    .build_document(schema, Some(path), map, ctx)
                    .map(Value::Node),
                Value::Json(JsonValue::Array(items)) => {
                    let items = items.into_iter().map(Value::from).collect();
                    self.build_collection(Some(schema), Some(path), items, ctx)
                        .map(Value::Node)
                }
                other => Ok(other),
            },
        }
    }

    pub(crate) fn cast_relation(
        &mut self,
        schema: &Schema,
        name: &str,
        value: Value,
        ctx: CastContext,
    ) -> Result<Value> {
        if value.is_null() || value.is_entity() {
            return Ok(value);
        }
        let relation = schema.relation(name)?;
        let target = self.registry.target_of(relation)?;
        match (relation.kind.is_many(), value) {
            (false, Value::Json(JsonValue::Object(map))) => self
                .build_document(target, None, map, ctx)
                .map(Value::Node),
            (true, Value::Json(JsonValue::Array(items))) => {
                let items = items.into_iter().map(Value::from).collect();
                self.build_collection(Some(target), None, items, ctx)
                    .map(Value::Node)
            }
            (_, other) => Err(MapperError::TypeMismatch(format!(
                "Cannot assign {} to {} relation '{}' on '{}'",
                other.type_name(),
                relation.kind.name(),
                name,
                schema.source()
            ))),
        }
    }

    /// Casts a raw value stored in collection `id`.
    pub(crate) fn cast_item(&mut self, id: NodeId, value: Value) -> Result<Value> {
        if value.is_entity() {
            return Ok(value);
        }
        let (schema, base_path) = {
            let collection = self.collection(id)?;
            (collection.schema.clone(), collection.base_path.clone())
        };
        let ctx = self.context(id)?;
        let Some(schema) = schema else {
            return Ok(value);
        };

        let Some(base_path) = base_path else {
            return match value {
                Value::Null => Ok(Value::Null),
                Value::Json(JsonValue::Object(map)) => self
                    .build_document(schema, None, map, ctx)
                    .map(Value::Node),
                other => Err(MapperError::TypeMismatch(format!(
                    "A collection of '{}' only holds documents, got {}",
                    schema.source(),
                    other.type_name()
                ))),
            };
        };

        let item_path = format!("{}.{}", base_path, WILDCARD);
        let def = schema
            .field(&item_path)
            .or_else(|| schema.field(&base_path))
            .cloned();
        match value {
            Value::Json(JsonValue::Object(map)) => {
                if def.as_ref().map_or(!schema.is_locked(), |d| d.is_object()) {
                    self.build_document(schema, Some(item_path), map, ctx)
                        .map(Value::Node)
                } else {
                    Err(MapperError::MissingFieldDefinition(
                        schema.source().to_string(),
                        item_path,
                    ))
                }
            }
            Value::Json(JsonValue::Array(items)) => {
                let items = items.into_iter().map(Value::from).collect();
                self.build_collection(Some(schema), Some(item_path), items, ctx)
                    .map(Value::Node)
            }
            other => match def {
                Some(def) => schema.convert(FormatMode::Cast, &def.type_name, &item_path, other),
                None => Ok(other),
            },
        }
    }

    // ========================================
    // Links and notifications
    // ========================================

    pub(crate) fn link(&mut self, value: &Value, parent: NodeId, field: &str) {
        if let Value::Node(child) = value {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parents_mut().insert(ParentLink::new(parent, field));
            }
        }
    }

    pub(crate) fn unlink(&mut self, value: &Value, parent: NodeId, field: &str) {
        if let Value::Node(child) = value {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parents_mut()
                    .shift_remove(&ParentLink::new(parent, field));
            }
        }
    }

    /// Records a change of `path` on `id` and on every ancestor, each node
    /// at most once per propagation.
    pub(crate) fn notify(&mut self, id: NodeId, path: &str) {
        let mut visited = HashSet::new();
        let mut pending = vec![(id, path.to_string())];

        while let Some((node, path)) = pending.pop() {
            if !visited.insert(node) {
                continue;
            }
            self.events.record(node, &path);

            let Some(current) = self.nodes.get(&node) else {
                continue;
            };
            for link in current.parents() {
                let field = if link.field == WILDCARD {
                    match self.nodes.get(&link.parent) {
                        Some(Node::Collection(collection)) => collection
                            .items
                            .iter()
                            .position(|item| item.as_node() == Some(node))
                            .map(|index| index.to_string())
                            .unwrap_or_else(|| WILDCARD.to_string()),
                        _ => WILDCARD.to_string(),
                    }
                } else {
                    link.field.clone()
                };
                pending.push((link.parent, format!("{}.{}", field, path)));
            }
        }
    }

    // ========================================
    // Node access
    // ========================================

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| MapperError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| MapperError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn document(&self, id: NodeId) -> Result<&DocumentNode> {
        match self.node(id)? {
            Node::Document(doc) => Ok(doc),
            Node::Collection(_) => Err(MapperError::TypeMismatch(format!(
                "Node {} is a collection, expected a document",
                id
            ))),
        }
    }

    pub(crate) fn document_mut(&mut self, id: NodeId) -> Result<&mut DocumentNode> {
        match self.node_mut(id)? {
            Node::Document(doc) => Ok(doc),
            Node::Collection(_) => Err(MapperError::TypeMismatch(format!(
                "Node {} is a collection, expected a document",
                id
            ))),
        }
    }

    pub(crate) fn collection(&self, id: NodeId) -> Result<&CollectionNode> {
        match self.node(id)? {
            Node::Collection(collection) => Ok(collection),
            Node::Document(_) => Err(MapperError::TypeMismatch(format!(
                "Node {} is a document, expected a collection",
                id
            ))),
        }
    }

    pub(crate) fn collection_mut(&mut self, id: NodeId) -> Result<&mut CollectionNode> {
        match self.node_mut(id)? {
            Node::Collection(collection) => Ok(collection),
            Node::Document(_) => Err(MapperError::TypeMismatch(format!(
                "Node {} is a document, expected a collection",
                id
            ))),
        }
    }
}

pub(crate) fn parse_index(segment: &str) -> Result<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| MapperError::InvalidIndex(segment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, Relation};
    use serde_json::json;

    fn graph() -> Graph {
        let mut registry = Registry::new();
        registry
            .register(
                Schema::new("galleries")
                    .column("id", FieldDef::new("id"))
                    .column("name", FieldDef::new("string"))
                    .bind("images", Relation::has_many("images")),
            )
            .unwrap();
        registry
            .register(
                Schema::new("images")
                    .column("id", FieldDef::new("id"))
                    .column("gallery_id", FieldDef::new("id"))
                    .column("name", FieldDef::new("string"))
                    .column("meta", FieldDef::new("object"))
                    .column("meta.*", FieldDef::new("string"))
                    .bind("gallery", Relation::belongs_to("galleries")),
            )
            .unwrap();
        Graph::new(Arc::new(registry))
    }

    #[test]
    fn test_build_links_children_to_parent() {
        let mut graph = graph();
        let gallery = graph
            .create("galleries", json!({"id": 1, "images": [{"id": 2}, {"id": 3}]}))
            .unwrap();
        let images = graph.peek(gallery, "images").unwrap().as_node().unwrap();
        assert!(graph.is_collection(images));
        assert_eq!(graph.parents(images).unwrap(), vec![ParentLink::new(gallery, "images")]);

        let first = graph.peek(images, "0").unwrap().as_node().unwrap();
        assert_eq!(graph.parents(first).unwrap(), vec![ParentLink::new(images, WILDCARD)]);
    }

    #[test]
    fn test_locked_schema_rejects_undeclared_field() {
        let mut graph = graph();
        let result = graph.create("images", json!({"id": 1, "unknown": true}));
        assert!(matches!(
            result,
            Err(MapperError::MissingFieldDefinition(source, field)) if source == "images" && field == "unknown"
        ));
    }

    #[test]
    fn test_failed_build_leaves_nothing_behind() {
        let mut graph = graph();
        let result = graph.create(
            "galleries",
            json!({"id": 1, "images": [{"id": 2}, {"id": 3, "unknown": true}]}),
        );
        assert!(matches!(result, Err(MapperError::MissingFieldDefinition(..))));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_writes_into_stored_owner_build_new_nodes() {
        let mut graph = graph();
        let image = graph
            .load("images", json!({"id": 1, "meta": {"width": 10}}))
            .unwrap();
        let meta = graph.peek(image, "meta").unwrap().as_node().unwrap();
        assert!(graph.exists(meta).unwrap());

        graph.set(image, "gallery", json!({"name": "Autumn"})).unwrap();
        let gallery = graph.peek(image, "gallery").unwrap().as_node().unwrap();
        assert!(!graph.exists(gallery).unwrap());

        // The replaced embedded object is dropped with the write
        graph.set(image, "meta", json!({"width": 20})).unwrap();
        assert!(!graph.contains(meta));
        assert!(graph.modified(image).unwrap());
    }

    #[test]
    fn test_nested_object_uses_base_path() {
        let mut graph = graph();
        let image = graph
            .create("images", json!({"id": 1, "meta": {"width": 10}}))
            .unwrap();
        assert_eq!(graph.get(image, "meta.width").unwrap(), Value::from("10"));
    }

    #[test]
    fn test_collector_shares_instances() {
        let mut graph = graph();
        let collector = graph.collector();
        let options = CreateOptions::new().exists(true).collector(collector);

        let a = graph
            .create_with("images", json!({"id": 1, "name": "a"}), options)
            .unwrap();
        let b = graph
            .create_with("images", json!({"id": "1", "name": "b", "gallery_id": 4}), options)
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(graph.get(a, "name").unwrap(), Value::from("a"));
        assert_eq!(graph.get(a, "gallery_id").unwrap(), Value::Integer(4));
        assert!(!graph.modified(a).unwrap());
        assert_eq!(graph.lookup(collector, "images", &Value::Integer(1)), Some(a));
    }

    #[test]
    fn test_key_change_reregisters_identity() {
        let mut graph = graph();
        let collector = graph.collector();
        let image = graph
            .create_with("images", json!({"id": 1}), CreateOptions::new().collector(collector))
            .unwrap();

        graph.set(image, "id", 9).unwrap();
        assert_eq!(graph.lookup(collector, "images", &Value::Integer(1)), None);
        assert_eq!(graph.lookup(collector, "images", &Value::Integer(9)), Some(image));

        graph.discard(image).unwrap();
        assert_eq!(graph.collector_len(collector), 0);
        assert!(!graph.contains(image));
    }
}
