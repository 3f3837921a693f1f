use serde_json::{Map, Value as JsonValue};

use super::{Embed, Graph, Node};
use crate::core::{NodeId, Result, Value, join_path};
use crate::schema::{EmbedTree, FormatMode};

/// Options for [`Graph::to_array_with`].
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Relations to include; `All` follows [`Graph::hierarchy`].
    pub embed: Embed,
    /// Exports the node stored at this path instead of the node itself.
    pub base_path: Option<String>,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embed = embed;
        self
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }
}

impl Graph {
    /// Plain-data export including every populated relation.
    pub fn to_array(&self, id: NodeId) -> Result<JsonValue> {
        self.to_array_with(id, &ExportOptions::default())
    }

    pub fn to_array_with(&self, id: NodeId, options: &ExportOptions) -> Result<JsonValue> {
        let id = match &options.base_path {
            Some(path) => match self.peek_path(id, path)? {
                Value::Node(node) => node,
                other => return self.export_scalar(id, path, &other),
            },
            None => id,
        };

        let tree = match &options.embed {
            Embed::All => EmbedTree::from_paths(self.hierarchy(id)?)?,
            Embed::None => EmbedTree::new(),
            Embed::Paths(tree) => tree.clone(),
        };
        self.export_node(id, &tree, FormatMode::Array)
    }

    /// Export without any relation.
    pub fn data(&self, id: NodeId) -> Result<JsonValue> {
        self.to_array_with(id, &ExportOptions::new().embed(Embed::None))
    }

    /// Own fields of an entity as handed to its provider on save.
    pub fn export_datasource(&self, id: NodeId) -> Result<Map<String, JsonValue>> {
        match self.export_node(id, &EmbedTree::new(), FormatMode::Datasource)? {
            JsonValue::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    fn export_scalar(&self, id: NodeId, path: &str, value: &Value) -> Result<JsonValue> {
        let schema = self.schema_of(id)?;
        Ok(schema
            .format(FormatMode::Array, path, value.clone())?
            .to_json())
    }

    fn export_node(&self, id: NodeId, tree: &EmbedTree, mode: FormatMode) -> Result<JsonValue> {
        let doc = match self.node(id)? {
            Node::Collection(collection) => {
                let mut items = Vec::with_capacity(collection.items.len());
                for (index, item) in collection.items.iter().enumerate() {
                    items.push(self.export_item(id, index, item, tree, mode)?);
                }
                return Ok(JsonValue::Array(items));
            }
            Node::Document(doc) => doc,
        };

        let schema = &doc.schema;
        let base_path = doc.base_path.as_deref();
        let relation_level = base_path.is_none();
        let mut out = Map::new();

        for (name, value) in &doc.data {
            let path = join_path(base_path, name);
            let is_relation = relation_level && schema.has_relation(name);
            if is_relation {
                if mode == FormatMode::Datasource || !tree.contains(name) {
                    continue;
                }
                let exported = match value {
                    Value::Node(child) => self.export_node(*child, &tree.subtree(name), mode)?,
                    _ => JsonValue::Null,
                };
                out.insert(name.clone(), exported);
                continue;
            }
            if schema.field(&path).is_some_and(|def| def.is_virtual) {
                continue;
            }
            let exported = match value {
                Value::Node(child) => self.export_node(*child, &EmbedTree::new(), mode)?,
                scalar => schema.format(mode, &path, scalar.clone())?.to_json(),
            };
            out.insert(name.clone(), exported);
        }

        if mode == FormatMode::Array {
            for (field_path, def) in schema.fields() {
                let Some(getter) = &def.getter else { continue };
                let name = match base_path {
                    Some(base) => match field_path.strip_prefix(&format!("{}.", base)) {
                        Some(rest) => rest,
                        None => continue,
                    },
                    None => field_path.as_str(),
                };
                if name.contains('.') {
                    continue;
                }
                let raw = doc.data.get(name).cloned().unwrap_or_default();
                let value = getter(self, id, raw, name)?;
                let exported = match value {
                    Value::Node(child) => self.export_node(child, &EmbedTree::new(), mode)?,
                    scalar => schema.format(mode, field_path, scalar)?.to_json(),
                };
                out.insert(name.to_string(), exported);
            }

            if relation_level {
                for (name, node) in tree.iter() {
                    let Ok(relation) = schema.relation(name) else { continue };
                    if !relation.is_through() {
                        continue;
                    }
                    let (through, using) = relation.through_parts()?;
                    out.insert(
                        name.clone(),
                        self.export_through(id, through, using, &node.embed)?,
                    );
                }
            }
        }

        Ok(JsonValue::Object(out))
    }

    fn export_item(
        &self,
        collection: NodeId,
        index: usize,
        item: &Value,
        tree: &EmbedTree,
        mode: FormatMode,
    ) -> Result<JsonValue> {
        match item {
            Value::Node(child) => self.export_node(*child, tree, mode),
            scalar => {
                let formatted = match self.node(collection)? {
                    Node::Collection(c) => match (&c.schema, &c.base_path) {
                        (Some(schema), Some(base)) => {
                            let path = format!("{}.{}", base, index);
                            schema.format(mode, &path, scalar.clone())?
                        }
                        _ => scalar.clone(),
                    },
                    Node::Document(_) => scalar.clone(),
                };
                Ok(formatted.to_json())
            }
        }
    }

    /// Far-side entities of a pivot collection, read from stored values.
    pub(crate) fn export_through(&self, owner: NodeId, through: &str, using: &str, tree: &EmbedTree) -> Result<JsonValue> {
        let Value::Node(pivot) = self.peek(owner, through)? else {
            return Ok(JsonValue::Array(Vec::new()));
        };
        let mut items = Vec::new();
        for row in self.collection(pivot)?.items.iter().filter_map(Value::as_node) {
            match self.peek(row, using)? {
                Value::Node(target) => items.push(self.export_node(target, tree, FormatMode::Array)?),
                _ => items.push(JsonValue::Null),
            }
        }
        Ok(JsonValue::Array(items))
    }
}
