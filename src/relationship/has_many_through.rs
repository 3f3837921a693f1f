use std::cmp::Ordering;

use serde_json::{Map, Value as JsonValue};

use crate::core::{MapperError, NodeId, Result, Value};
use crate::graph::{CastContext, Graph, parse_index};

/// Projection over the far side of a many-to-many relation.
///
/// Stores nothing itself: every call walks the owner's pivot collection and
/// reads or writes the `target` relation of each pivot row. Handed out fresh
/// on every read of the alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Through {
    pub owner: NodeId,
    /// Relation from the owner to the pivot rows.
    pub pivot: String,
    /// Relation from a pivot row to the far entity.
    pub target: String,
}

impl Through {
    pub fn new(owner: NodeId, pivot: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            owner,
            pivot: pivot.into(),
            target: target.into(),
        }
    }

    /// The owner's pivot collection, materialized empty for new owners.
    pub fn pivot_collection(&self, graph: &mut Graph) -> Result<NodeId> {
        match graph.get(self.owner, &self.pivot)? {
            Value::Node(id) if graph.is_collection(id) => Ok(id),
            _ => Err(MapperError::NotAnEntity(self.pivot.clone())),
        }
    }

    pub fn count(&self, graph: &mut Graph) -> Result<usize> {
        let pivot = self.pivot_collection(graph)?;
        graph.count(pivot)
    }

    /// Far entity of the pivot row at `index`.
    pub fn get(&self, graph: &mut Graph, index: usize) -> Result<Value> {
        let pivot = self.pivot_collection(graph)?;
        match graph.item(pivot, index)? {
            Value::Node(row) => graph.get(row, &self.target),
            _ => Ok(Value::Null),
        }
    }

    pub(crate) fn get_segment(&self, graph: &mut Graph, segment: &str) -> Result<Value> {
        self.get(graph, parse_index(segment)?)
    }

    /// Replaces the far entity at `index`; `index == count` pushes.
    pub fn set(&self, graph: &mut Graph, index: usize, value: impl Into<Value>) -> Result<()> {
        let pivot = self.pivot_collection(graph)?;
        let count = graph.count(pivot)?;
        if index == count {
            return self.push(graph, value).map(|_| ());
        }
        if index > count {
            return Err(MapperError::InvalidIndex(format!(
                "{} is out of bounds for '{}' with {} items",
                index, self.pivot, count
            )));
        }
        match graph.item(pivot, index)? {
            Value::Node(row) => graph.set(row, &self.target, value),
            _ => Err(MapperError::NotAnEntity(format!("{}.{}", self.pivot, index))),
        }
    }

    pub(crate) fn set_segment(&self, graph: &mut Graph, segment: &str, value: Value) -> Result<()> {
        self.set(graph, parse_index(segment)?, value)
    }

    /// Appends a pivot row pointing at `value` and returns the row.
    ///
    /// The row's foreign key to the owner is filled in when the owner is
    /// already persisted.
    pub fn push(&self, graph: &mut Graph, value: impl Into<Value>) -> Result<NodeId> {
        let pivot = self.pivot_collection(graph)?;
        let row = self.build_row(graph, value.into())?;
        graph.push(pivot, Value::Node(row))?;
        Ok(row)
    }

    fn build_row(&self, graph: &mut Graph, value: Value) -> Result<NodeId> {
        let owner_schema = graph.schema_of(self.owner)?;
        let relation = owner_schema.relation(&self.pivot)?;
        let keys = relation.keys_or_err()?.clone();
        let pivot_schema = graph.registry().target_of(relation)?;

        let row = graph.build_document(pivot_schema, None, Map::new(), CastContext::default())?;
        if graph.exists(self.owner)? {
            let key = graph.peek(self.owner, &keys.from)?;
            if !key.is_null() {
                graph.write(row, &keys.to, key, false)?;
            }
        }
        if let Err(err) = graph.write(row, &self.target, value, false) {
            graph.discard(row)?;
            return Err(err);
        }
        Ok(row)
    }

    /// Removes the pivot row at `index`.
    pub fn unset(&self, graph: &mut Graph, index: usize) -> Result<()> {
        let pivot = self.pivot_collection(graph)?;
        let removed = graph.unset_index(pivot, index)?;
        graph.drop_orphan(&removed)
    }

    pub fn values(&self, graph: &mut Graph) -> Result<Vec<Value>> {
        let count = self.count(graph)?;
        (0..count).map(|index| self.get(graph, index)).collect()
    }

    /// Reorders the pivot rows by comparing their far entities.
    pub fn sort_by<F>(&self, graph: &mut Graph, mut compare: F) -> Result<()>
    where
        F: FnMut(&Graph, &Value, &Value) -> Ordering,
    {
        let pivot = self.pivot_collection(graph)?;
        let target = self.target.clone();
        graph.sort_by(pivot, |graph, a, b| {
            let a = a
                .as_node()
                .and_then(|row| graph.peek(row, &target).ok())
                .unwrap_or_default();
            let b = b
                .as_node()
                .and_then(|row| graph.peek(row, &target).ok())
                .unwrap_or_default();
            compare(graph, &a, &b)
        })
    }

    /// Replaces every pivot row with rows pointing at `value`'s items.
    pub fn replace(&self, graph: &mut Graph, value: Value) -> Result<()> {
        let items: Vec<Value> = match value {
            Value::Null => Vec::new(),
            Value::Json(JsonValue::Array(items)) => items.into_iter().map(Value::from).collect(),
            Value::Through(other) => other.values(graph)?,
            Value::Node(id) if graph.is_collection(id) => graph.values(id)?,
            other => {
                return Err(MapperError::TypeMismatch(format!(
                    "Cannot assign {} to '{}'",
                    other.type_name(),
                    self.pivot
                )));
            }
        };

        // New rows hold the far entities before the old pivot collection
        // and its rows are discarded.
        let owner_schema = graph.schema_of(self.owner)?;
        let pivot_schema = graph.registry().target_of(owner_schema.relation(&self.pivot)?)?;
        let rows = graph.build_collection(Some(pivot_schema), None, Vec::new(), CastContext::default())?;
        for (index, item) in items.into_iter().enumerate() {
            let built = self
                .build_row(graph, item)
                .and_then(|row| graph.write_index(rows, index, Value::Node(row), false));
            if let Err(err) = built {
                graph.discard(rows)?;
                return Err(err);
            }
        }
        graph.write(self.owner, &self.pivot, Value::Node(rows), true)
    }

    /// Far entities exported from stored values.
    pub fn to_array(&self, graph: &Graph) -> Result<JsonValue> {
        graph.export_through(self.owner, &self.pivot, &self.target, &Default::default())
    }
}
