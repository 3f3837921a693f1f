use std::cmp::Ordering;

use super::{CastContext, Graph};
use crate::core::{MapperError, NodeId, Result, Value, WILDCARD};

impl Graph {
    pub fn count(&self, id: NodeId) -> Result<usize> {
        Ok(self.collection(id)?.items.len())
    }

    /// Item at `index`, null past the end.
    pub fn item(&self, id: NodeId, index: usize) -> Result<Value> {
        Ok(self
            .collection(id)?
            .items
            .get(index)
            .cloned()
            .unwrap_or_default())
    }

    pub fn values(&self, id: NodeId) -> Result<Vec<Value>> {
        Ok(self.collection(id)?.items.clone())
    }

    /// Appends a cast item and returns its index.
    pub fn push(&mut self, id: NodeId, value: impl Into<Value>) -> Result<usize> {
        let value = self.cast_item(id, value.into())?;
        self.link(&value, id, WILDCARD);
        let collection = self.collection_mut(id)?;
        collection.items.push(value);
        let index = collection.items.len() - 1;
        self.notify(id, &index.to_string());
        Ok(index)
    }

    /// Replaces the item at `index`; `index == count` appends.
    pub fn set_index(&mut self, id: NodeId, index: usize, value: impl Into<Value>) -> Result<()> {
        self.write_index(id, index, value.into(), true)
    }

    pub(crate) fn write_index(&mut self, id: NodeId, index: usize, value: Value, notify: bool) -> Result<()> {
        let len = self.count(id)?;
        if index > len {
            return Err(MapperError::InvalidIndex(format!(
                "{} is out of bounds for a collection of {} items",
                index, len
            )));
        }

        let value = self.cast_item(id, value)?;
        if index == len {
            self.link(&value, id, WILDCARD);
            self.collection_mut(id)?.items.push(value);
        } else {
            let previous = self.collection(id)?.items[index].clone();
            if previous.same(&value) {
                return Ok(());
            }
            self.collection_mut(id)?.items[index] = value.clone();
            self.release(id, &previous);
            self.link(&value, id, WILDCARD);
            self.drop_orphan(&previous)?;
        }
        if notify {
            self.notify(id, &index.to_string());
        }
        Ok(())
    }

    /// Removes the item at `index`, shifting later items down. The removed
    /// node stays in the graph for the caller to reuse or `discard`.
    pub fn unset_index(&mut self, id: NodeId, index: usize) -> Result<Value> {
        self.remove_index(id, index)
    }

    pub(crate) fn remove_index(&mut self, id: NodeId, index: usize) -> Result<Value> {
        let len = self.count(id)?;
        if index >= len {
            return Err(MapperError::InvalidIndex(format!(
                "{} is out of bounds for a collection of {} items",
                index, len
            )));
        }
        let removed = self.collection_mut(id)?.items.remove(index);
        self.release(id, &removed);
        self.notify(id, &index.to_string());
        Ok(removed)
    }

    /// Drops the parent link of `value` unless the collection still holds it.
    fn release(&mut self, id: NodeId, value: &Value) {
        let still_held = self
            .collection(id)
            .map(|collection| collection.items.iter().any(|item| item.same(value)))
            .unwrap_or(false);
        if !still_held {
            self.unlink(value, id, WILDCARD);
        }
    }

    pub fn find<F>(&self, id: NodeId, mut predicate: F) -> Result<Option<Value>>
    where
        F: FnMut(&Graph, &Value) -> bool,
    {
        Ok(self
            .collection(id)?
            .items
            .iter()
            .find(|item| predicate(self, item))
            .cloned())
    }

    pub fn index_of(&self, id: NodeId, value: &Value) -> Result<Option<usize>> {
        Ok(self
            .collection(id)?
            .items
            .iter()
            .position(|item| item.same(value)))
    }

    /// New collection of the same kind holding the matching items.
    pub fn filter<F>(&mut self, id: NodeId, mut predicate: F) -> Result<NodeId>
    where
        F: FnMut(&Graph, &Value) -> bool,
    {
        let graph: &Graph = self;
        let items: Vec<Value> = graph
            .collection(id)?
            .items
            .iter()
            .filter(|item| predicate(graph, item))
            .cloned()
            .collect();
        self.derive(id, items)
    }

    pub fn map<T, F>(&self, id: NodeId, mut f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Graph, &Value) -> Result<T>,
    {
        self.collection(id)?
            .items
            .iter()
            .map(|item| f(self, item))
            .collect()
    }

    pub fn reduce<T, F>(&self, id: NodeId, init: T, mut f: F) -> Result<T>
    where
        F: FnMut(T, &Graph, &Value) -> Result<T>,
    {
        let mut acc = init;
        for item in &self.collection(id)?.items {
            acc = f(acc, self, item)?;
        }
        Ok(acc)
    }

    /// New collection holding items `start..end` (clamped).
    pub fn slice(&mut self, id: NodeId, start: usize, end: Option<usize>) -> Result<NodeId> {
        let items = &self.collection(id)?.items;
        let end = end.unwrap_or(items.len()).min(items.len());
        let start = start.min(end);
        let items = items[start..end].to_vec();
        self.derive(id, items)
    }

    /// Sorts in place with a stable sort.
    pub fn sort_by<F>(&mut self, id: NodeId, mut compare: F) -> Result<()>
    where
        F: FnMut(&Graph, &Value, &Value) -> Ordering,
    {
        let mut items = std::mem::take(&mut self.collection_mut(id)?.items);
        let before = items.clone();
        {
            let graph: &Graph = self;
            items.sort_by(|a, b| compare(graph, a, b));
        }
        self.collection_mut(id)?.items = items;

        let moved: Vec<usize> = {
            let items = &self.collection(id)?.items;
            (0..items.len())
                .filter(|&i| !items[i].same(&before[i]))
                .collect()
        };
        for index in moved {
            self.notify(id, &index.to_string());
        }
        Ok(())
    }

    /// Sorts documents by the stored value of `field`; nulls sort last.
    pub fn sort_by_key(&mut self, id: NodeId, field: &str) -> Result<()> {
        self.sort_by(id, |graph, a, b| {
            let a = a
                .as_node()
                .and_then(|node| graph.peek(node, field).ok())
                .unwrap_or_default();
            let b = b
                .as_node()
                .and_then(|node| graph.peek(node, field).ok())
                .unwrap_or_default();
            a.compare(&b).unwrap_or(Ordering::Equal)
        })
    }

    fn derive(&mut self, id: NodeId, items: Vec<Value>) -> Result<NodeId> {
        let (schema, base_path, ctx) = {
            let collection = self.collection(id)?;
            (
                collection.schema.clone(),
                collection.base_path.clone(),
                CastContext {
                    exists: collection.exists,
                    collector: collection.collector,
                },
            )
        };
        let derived = self.build_collection(schema, base_path, items, ctx)?;
        self.node_mut(derived)?.mark_root();
        Ok(derived)
    }
}
