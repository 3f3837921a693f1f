use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tokio::sync::{Mutex, RwLock};

use super::{DeleteRequest, FetchOptions, Provider, Query, SaveOutcome, SaveRequest};
use crate::core::{MapperError, Result};

/// Rows kept in memory, matched by loose equality on condition fields.
///
/// Records every query it receives so callers can check how many fetches a
/// load issued.
pub struct MemoryProvider {
    key_field: String,
    rows: RwLock<Vec<JsonValue>>,
    queries: Mutex<Vec<Query>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryProvider {
    pub fn new(rows: Vec<JsonValue>) -> Self {
        Self::with_key("id", rows)
    }

    pub fn with_key(key_field: &str, rows: Vec<JsonValue>) -> Self {
        Self {
            key_field: key_field.to_string(),
            rows: RwLock::new(rows),
            queries: Mutex::new(Vec::new()),
            saves: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn queries(&self) -> Vec<Query> {
        self.queries.lock().await.clone()
    }

    pub async fn rows(&self) -> Vec<JsonValue> {
        self.rows.read().await.clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MapperError::Provider("memory provider unavailable".to_string()));
        }
        Ok(())
    }

    fn loose_eq(a: &JsonValue, b: &JsonValue) -> bool {
        match (a, b) {
            (JsonValue::String(a), JsonValue::Number(b))
            | (JsonValue::Number(b), JsonValue::String(a)) => a == &b.to_string(),
            (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
            _ => a == b,
        }
    }

    fn matches(row: &JsonValue, query: &Query) -> bool {
        query.conditions.iter().all(|(field, condition)| {
            let value = row.get(field).unwrap_or(&JsonValue::Null);
            match condition {
                JsonValue::Array(candidates) => {
                    candidates.iter().any(|candidate| Self::loose_eq(value, candidate))
                }
                other => Self::loose_eq(value, other),
            }
        })
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn all(&self, query: Query, _options: FetchOptions) -> Result<Vec<JsonValue>> {
        self.queries.lock().await.push(query.clone());
        self.check()?;
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|row| Self::matches(row, &query))
            .cloned()
            .collect())
    }

    async fn save(&self, request: SaveRequest) -> Result<SaveOutcome> {
        self.check()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().await;

        let key = match request.key.clone().filter(|k| !k.is_null()) {
            Some(key) => key,
            None => {
                let next = rows
                    .iter()
                    .filter_map(|row| row.get(&self.key_field).and_then(|k| k.as_i64()))
                    .max()
                    .unwrap_or(0)
                    + 1;
                json!(next)
            }
        };

        let mut record = request.data.clone();
        record.insert(self.key_field.clone(), key.clone());

        let position = rows.iter().position(|row| {
            row.get(&self.key_field)
                .map(|existing| Self::loose_eq(existing, &key))
                .unwrap_or(false)
        });
        match position {
            Some(index) => {
                if let Some(JsonValue::Object(existing)) = rows.get_mut(index) {
                    existing.extend(record);
                }
            }
            None => rows.push(JsonValue::Object(record)),
        }

        let generated = request.key.filter(|k| !k.is_null()).is_none();
        Ok(SaveOutcome {
            saved: true,
            key: generated.then_some(key),
        })
    }

    async fn delete(&self, request: DeleteRequest) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| {
            !row.get(&request.key_field)
                .map(|existing| Self::loose_eq(existing, &request.key))
                .unwrap_or(false)
        });
        Ok(rows.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_matches_in_list_and_records_queries() {
        let provider = MemoryProvider::new(vec![
            json!({"id": 1, "name": "a"}),
            json!({"id": 2, "name": "b"}),
            json!({"id": 3, "name": "c"}),
        ]);

        let rows = provider
            .all(Query::new().condition("id", json!([1, "3"])), FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(provider.queries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_save_generates_key_and_updates() {
        let provider = MemoryProvider::new(vec![json!({"id": 4, "name": "a"})]);

        let mut data = serde_json::Map::new();
        data.insert("name".into(), json!("b"));
        let outcome = provider
            .save(SaveRequest {
                source: "tags".into(),
                key_field: Some("id".into()),
                key: None,
                exists: false,
                data: data.clone(),
            })
            .await
            .unwrap();
        assert!(outcome.saved);
        assert_eq!(outcome.key, Some(json!(5)));

        data.insert("name".into(), json!("c"));
        let outcome = provider
            .save(SaveRequest {
                source: "tags".into(),
                key_field: Some("id".into()),
                key: Some(json!(4)),
                exists: true,
                data,
            })
            .await
            .unwrap();
        assert_eq!(outcome.key, None);
        assert_eq!(provider.rows().await[0]["name"], json!("c"));
        assert_eq!(provider.save_count(), 2);
    }

    #[test]
    fn test_failing_provider() {
        let provider = MemoryProvider::new(vec![]);
        provider.set_failing(true);
        let result = tokio_test::block_on(provider.all(Query::new(), FetchOptions::default()));
        assert!(matches!(result, Err(MapperError::Provider(_))));
        assert_eq!(tokio_test::block_on(provider.queries()).len(), 1);
    }
}
