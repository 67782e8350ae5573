// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`DocumentStore`].
//!
//! Documents travel as `serde_json::Value` bodies. Nested collection paths
//! such as `users/{uid}/login_history` are resolved to a Firestore parent
//! path plus a collection id.

use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use serde_json::Value;

use super::{new_document_id, DocumentStore, StoreError, StoredDocument};

/// Fields the Firestore deserializer injects into every document body.
const FIRESTORE_ID_FIELD: &str = "_firestore_id";
const FIRESTORE_META_PREFIX: &str = "_firestore_";

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations will return `StoreError::Unavailable`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("Database not connected (offline mode)".into()))
    }

    /// Split `a/b/c` into (`<documents path>/a/b`, `c`).
    fn resolve_path(
        client: &firestore::FirestoreDb,
        path: &str,
    ) -> Result<(String, String), StoreError> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) || segments.len() % 2 == 0 {
            return Err(StoreError::InvalidData(format!(
                "invalid collection path: {path}"
            )));
        }

        let (collection_id, parents) = segments
            .split_last()
            .ok_or_else(|| StoreError::InvalidData("empty collection path".to_string()))?;

        let mut parent = client.get_documents_path().to_string();
        for segment in parents {
            parent.push('/');
            parent.push_str(segment);
        }

        Ok((parent, collection_id.to_string()))
    }
}

/// Map a Firestore error, attaching the document address where relevant.
fn map_err(e: FirestoreError, collection: &str, key: &str) -> StoreError {
    match e {
        FirestoreError::DataNotFoundError(_) => StoreError::NotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        },
        FirestoreError::DataConflictError(_) => StoreError::AlreadyExists {
            collection: collection.to_string(),
            key: key.to_string(),
        },
        FirestoreError::SerializeError(err) => StoreError::InvalidData(err.to_string()),
        FirestoreError::DeserializeError(err) => StoreError::InvalidData(err.to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

/// Strip the deserializer's metadata fields and recover the document key.
fn into_stored(mut data: Value, fallback_id: Option<&str>) -> Result<StoredDocument, StoreError> {
    let map = data
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidData("document body is not an object".to_string()))?;

    let id = map
        .get(FIRESTORE_ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| fallback_id.map(str::to_string))
        .ok_or_else(|| StoreError::InvalidData("document without id".to_string()))?;

    map.retain(|k, _| !k.starts_with(FIRESTORE_META_PREFIX));

    Ok(StoredDocument { id, data })
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let client = self.get_client()?;
        let (parent, collection_id) = Self::resolve_path(client, collection)?;

        let doc: Option<Value> = client
            .fluent()
            .select()
            .by_id_in(&collection_id)
            .parent(&parent)
            .obj()
            .one(key)
            .await
            .map_err(|e| map_err(e, collection, key))?;

        doc.map(|data| into_stored(data, Some(key))).transpose()
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let client = self.get_client()?;
        let (parent, collection_id) = Self::resolve_path(client, collection)?;
        let field = field.to_string();
        let value = value.clone();

        let docs: Vec<Value> = client
            .fluent()
            .select()
            .from(collection_id.as_str())
            .parent(&parent)
            .filter(move |q| q.field(field.as_str()).eq(value.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| map_err(e, collection, ""))?;

        docs.into_iter().map(|d| into_stored(d, None)).collect()
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let client = self.get_client()?;
        let (parent, collection_id) = Self::resolve_path(client, collection)?;

        let docs: Vec<Value> = client
            .fluent()
            .select()
            .from(collection_id.as_str())
            .parent(&parent)
            .obj()
            .query()
            .await
            .map_err(|e| map_err(e, collection, ""))?;

        docs.into_iter().map(|d| into_stored(d, None)).collect()
    }

    async fn create(
        &self,
        collection: &str,
        key: Option<&str>,
        data: Value,
    ) -> Result<String, StoreError> {
        let client = self.get_client()?;
        let (parent, collection_id) = Self::resolve_path(client, collection)?;
        let key = match key {
            Some(k) => k.to_string(),
            None => new_document_id()?,
        };

        // Insert fails with ALREADY_EXISTS rather than overwriting.
        let _: Value = client
            .fluent()
            .insert()
            .into(&collection_id)
            .document_id(&key)
            .parent(&parent)
            .object(&data)
            .execute()
            .await
            .map_err(|e| map_err(e, collection, &key))?;

        Ok(key)
    }

    async fn update(&self, collection: &str, key: &str, fields: Value) -> Result<(), StoreError> {
        let client = self.get_client()?;
        let (parent, collection_id) = Self::resolve_path(client, collection)?;

        let field_paths: Vec<String> = fields
            .as_object()
            .ok_or_else(|| StoreError::InvalidData("update fields must be an object".into()))?
            .keys()
            .cloned()
            .collect();

        let _: Value = client
            .fluent()
            .update()
            .fields(field_paths)
            .in_col(&collection_id)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(key)
            .parent(&parent)
            .object(&fields)
            .execute()
            .await
            .map_err(|e| map_err(e, collection, key))?;

        Ok(())
    }
}
