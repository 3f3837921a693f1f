use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to a document or collection living in a [`Graph`](crate::Graph).
///
/// Handles are plain copyable keys; holding one never keeps a node alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to an identity map owned by a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectorId(pub(crate) usize);

/// Back-reference from a child node to the node holding it.
///
/// Collection items are linked under the `*` field since their position is
/// not stable across removals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParentLink {
    pub parent: NodeId,
    pub field: String,
}

impl ParentLink {
    pub fn new(parent: NodeId, field: impl Into<String>) -> Self {
        Self {
            parent,
            field: field.into(),
        }
    }
}

pub const WILDCARD: &str = "*";

/// Splits a dotted path, rejecting empty paths and empty segments.
pub fn split_path(path: &str) -> crate::core::Result<Vec<&str>> {
    if path.is_empty() {
        return Err(crate::core::MapperError::InvalidPath(path.to_string()));
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(crate::core::MapperError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Joins a base path and a field name with a dot.
pub fn join_path(base: Option<&str>, name: &str) -> String {
    match base {
        Some(base) if !base.is_empty() => format!("{}.{}", base, name),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("a.b.c").unwrap(), vec!["a", "b", "c"]);
        assert!(split_path("").is_err());
        assert!(split_path("a..b").is_err());
        assert!(split_path(".a").is_err());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(None, "name"), "name");
        assert_eq!(join_path(Some(""), "name"), "name");
        assert_eq!(join_path(Some("address"), "city"), "address.city");
    }
}
