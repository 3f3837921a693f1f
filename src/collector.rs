use std::collections::HashMap;

use uuid::Uuid;

use crate::core::{NodeId, Value};

/// Identity map: at most one live document per identity key.
///
/// Collectors are owned by a [`Graph`](crate::Graph) and handed around by
/// [`CollectorId`](crate::CollectorId) through cast contexts, so two
/// unrelated loads never share identities unless given the same collector.
#[derive(Debug, Default)]
pub struct Collector {
    entries: HashMap<Uuid, NodeId>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Uuid) -> Option<NodeId> {
        self.entries.get(key).copied()
    }

    pub fn has(&self, key: &Uuid) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set(&mut self, key: Uuid, node: NodeId) {
        self.entries.insert(key, node);
    }

    /// Removes `key` only while it still points at `node`.
    pub fn remove(&mut self, key: &Uuid, node: NodeId) -> bool {
        if self.entries.get(key) == Some(&node) {
            self.entries.remove(key);
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Opaque identity of the row `key` of kind `source`.
pub fn identity_key(source: &str, key: &Value) -> Option<Uuid> {
    let key = key.index_key()?;
    Some(Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}:{}", source, key).as_bytes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key() {
        let a = identity_key("images", &Value::Integer(1)).unwrap();
        let b = identity_key("images", &Value::Text("1".into())).unwrap();
        let c = identity_key("galleries", &Value::Integer(1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(identity_key("images", &Value::Null).is_none());
    }

    #[test]
    fn test_remove_only_matching_node() {
        let mut collector = Collector::new();
        let key = identity_key("images", &Value::Integer(1)).unwrap();
        collector.set(key, NodeId(1));

        assert!(!collector.remove(&key, NodeId(2)));
        assert!(collector.has(&key));
        assert!(collector.remove(&key, NodeId(1)));
        assert!(collector.is_empty());
    }
}
