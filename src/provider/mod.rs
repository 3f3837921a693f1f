//! Storage collaborator seam.
//!
//! The graph never talks to a store directly. Each entity kind registers a
//! [`Provider`] that fetches rows matching a [`Query`] and persists or
//! removes single records.

mod memory;

pub use memory::MemoryProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::core::Result;

/// Conditions for a batched fetch. A condition holding an array matches
/// rows whose field equals any of its elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub conditions: Map<String, JsonValue>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, field: impl Into<String>, value: JsonValue) -> Self {
        self.conditions.insert(field.into(), value);
        self
    }

    /// Merges an object of extra conditions; other JSON values are ignored.
    pub fn merge(mut self, extra: Option<&JsonValue>) -> Self {
        if let Some(JsonValue::Object(extra)) = extra {
            for (field, value) in extra {
                self.conditions.insert(field.clone(), value.clone());
            }
        }
        self
    }
}

/// Caller-side options forwarded untouched to `Provider::all`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Relation being resolved, when the fetch comes from eager loading.
    pub relation: Option<String>,
    pub extra: Map<String, JsonValue>,
}

impl FetchOptions {
    pub(crate) fn for_relation(&self, relation: &str) -> Self {
        Self {
            relation: Some(relation.to_string()),
            extra: self.extra.clone(),
        }
    }
}

/// A single record handed to `Provider::save`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub source: String,
    pub key_field: Option<String>,
    pub key: Option<JsonValue>,
    pub exists: bool,
    pub data: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub saved: bool,
    /// Key generated by the store for a new record.
    pub key: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub source: String,
    pub key_field: String,
    pub key: JsonValue,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetches every row matching `query`.
    async fn all(&self, query: Query, options: FetchOptions) -> Result<Vec<JsonValue>>;

    async fn save(&self, request: SaveRequest) -> Result<SaveOutcome>;

    async fn delete(&self, request: DeleteRequest) -> Result<bool>;
}
