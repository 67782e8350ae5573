//! Database layer.
//!
//! Services talk to the store through the [`DocumentStore`] trait so the
//! Firestore client can be swapped for the in-memory store in tests and
//! local development.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use async_trait::async_trait;
use ring::rand::{SecureRandom, SystemRandom};
use serde_json::Value;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const AUDIT_LOGS: &str = "audit_logs";
    /// Subcollection under `users/{uid}`
    pub const LOGIN_HISTORY: &str = "login_history";

    /// Path of a user's login history subcollection.
    pub fn login_history(uid: &str) -> String {
        format!("{USERS}/{uid}/{LOGIN_HISTORY}")
    }
}

/// Store-level errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("document {collection}/{key} not found")]
    NotFound { collection: String, key: String },

    #[error("document {collection}/{key} already exists")]
    AlreadyExists { collection: String, key: String },

    #[error("invalid document data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// A document read back from the store together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

impl StoredDocument {
    /// Deserialize the document body, injecting the key as the `id` field.
    pub fn into_typed<T: serde::de::DeserializeOwned>(self) -> Result<T, StoreError> {
        let mut data = self.data;
        if let Value::Object(map) = &mut data {
            map.insert("id".to_string(), Value::String(self.id));
        }
        Ok(serde_json::from_value(data)?)
    }
}

/// Generic document store: create/query/update documents by collection + key.
///
/// Collections may be nested paths (`users/{uid}/login_history`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by key.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// All documents whose top-level `field` equals `value` exactly.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Every document in the collection.
    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError>;

    /// Insert a new document. Fails with `AlreadyExists` if the key is taken.
    ///
    /// A key is generated when none is given. Returns the document key.
    async fn create(
        &self,
        collection: &str,
        key: Option<&str>,
        data: Value,
    ) -> Result<String, StoreError>;

    /// Merge top-level fields into an existing document.
    async fn update(&self, collection: &str, key: &str, fields: Value) -> Result<(), StoreError>;
}

/// Generate a random 20-character document key.
pub fn new_document_id() -> Result<String, StoreError> {
    let mut bytes = [0u8; 10];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| StoreError::Unavailable("random generator failure".to_string()))?;
    Ok(hex::encode(bytes))
}

/// Serialize a value into a JSON object body.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    match serde_json::to_value(value)? {
        obj @ Value::Object(_) => Ok(obj),
        other => Err(StoreError::InvalidData(format!(
            "expected an object, got {other}"
        ))),
    }
}
