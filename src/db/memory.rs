//! In-memory document store.
//!
//! Backs the integration tests and `STORE_BACKEND=memory` local runs.
//! Data is lost when the store is dropped.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{new_document_id, DocumentStore, StoreError, StoredDocument};

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// `HashMap`-backed store shared behind an `Arc<RwLock<..>>`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Total number of documents across all collections.
    pub async fn total_documents(&self) -> usize {
        self.collections
            .read()
            .await
            .values()
            .map(BTreeMap::len)
            .sum()
    }
}

fn to_stored((id, data): (&String, &Value)) -> StoredDocument {
    StoredDocument {
        id: id.clone(),
        data: data.clone(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get_key_value(key))
            .map(to_stored))
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, data)| data.get(field) == Some(value))
                    .map(to_stored)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().map(to_stored).collect())
            .unwrap_or_default())
    }

    async fn create(
        &self,
        collection: &str,
        key: Option<&str>,
        data: Value,
    ) -> Result<String, StoreError> {
        if !data.is_object() {
            return Err(StoreError::InvalidData(
                "document body must be an object".to_string(),
            ));
        }

        let key = match key {
            Some(k) => k.to_string(),
            None => new_document_id()?,
        };

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                key,
            });
        }
        docs.insert(key.clone(), data);
        Ok(key)
    }

    async fn update(&self, collection: &str, key: &str, fields: Value) -> Result<(), StoreError> {
        let Value::Object(fields) = fields else {
            return Err(StoreError::InvalidData(
                "update fields must be an object".to_string(),
            ));
        };

        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;

        if let Value::Object(existing) = doc {
            existing.extend(fields);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryStore::new();
        let key = store
            .create("users", Some("u1"), json!({ "name": "Alice" }))
            .await
            .unwrap();
        assert_eq!(key, "u1");

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data["name"], "Alice");
        assert!(store.get("users", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_existing_key_fails() {
        let store = MemoryStore::new();
        store.create("users", Some("u1"), json!({})).await.unwrap();
        let err = store
            .create("users", Some("u1"), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_create_generates_key() {
        let store = MemoryStore::new();
        let a = store.create("logs", None, json!({})).await.unwrap();
        let b = store.create("logs", None, json!({})).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count("logs").await, 2);
    }

    #[tokio::test]
    async fn test_query_eq_is_exact() {
        let store = MemoryStore::new();
        store
            .create("users", Some("a"), json!({ "email": "alice@example.com" }))
            .await
            .unwrap();
        store
            .create("users", Some("b"), json!({ "email": "Alice@example.com" }))
            .await
            .unwrap();

        let hits = store
            .query_eq("users", "email", &json!("alice@example.com"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        store
            .create("users", Some("u1"), json!({ "name": "Alice", "n": 1 }))
            .await
            .unwrap();
        store
            .update("users", "u1", json!({ "n": 2 }))
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({ "name": "Alice", "n": 2 }));
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryStore::new();
        let err = store
            .update("users", "nope", json!({ "n": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
