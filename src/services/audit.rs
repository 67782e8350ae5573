// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Append-only audit log.
//!
//! Writes are best-effort: a failed append is logged and reported as
//! [`AuditWrite::Dropped`], never as an error, so the operation being
//! audited always completes on its own merits.

use std::sync::Arc;

use chrono::Utc;

use crate::db::{collections, to_document, DocumentStore, StoreError, StoredDocument};
use crate::models::{AuditEntry, AuditEvent, AuditFilters, AuditStats, ClientEnv};

/// Result of a best-effort audit append.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditWrite {
    /// Entry stored under this document ID
    Recorded(String),
    /// Entry lost; the cause was logged
    Dropped(String),
    /// Nothing happened that needed an entry
    Skipped,
}

impl AuditWrite {
    pub fn id(&self) -> Option<&str> {
        match self {
            AuditWrite::Recorded(id) => Some(id),
            AuditWrite::Dropped(_) | AuditWrite::Skipped => None,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditWrite::Recorded(_))
    }
}

/// Writer and reader for the `audit_logs` collection.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn DocumentStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append one entry, stamping it with the current time and client env.
    pub async fn append(&self, event: AuditEvent, env: &ClientEnv) -> AuditWrite {
        let entry = event.into_entry(Utc::now(), env);

        let result = match to_document(&entry) {
            Ok(mut data) => {
                if let Some(map) = data.as_object_mut() {
                    map.remove("id");
                }
                self.store.create(collections::AUDIT_LOGS, None, data).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(id) => {
                tracing::debug!(
                    audit_id = %id,
                    user_id = %entry.user_id,
                    action = %entry.action,
                    provider = %entry.auth_provider,
                    success = entry.success,
                    merged = entry.merged,
                    "Audit event recorded"
                );
                AuditWrite::Recorded(id)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %entry.user_id,
                    user_email = %entry.user_email,
                    action = %entry.action,
                    provider = %entry.auth_provider,
                    "Failed to record audit event"
                );
                AuditWrite::Dropped(e.to_string())
            }
        }
    }

    /// Full scan, filtered in memory, newest first.
    pub async fn query(&self, filters: &AuditFilters) -> Result<Vec<AuditEntry>, StoreError> {
        let docs = self.store.list(collections::AUDIT_LOGS).await?;
        let mut entries = parse_entries(docs)
            .into_iter()
            .filter(|entry| filters.matches(entry))
            .collect::<Vec<_>>();

        sort_newest_first(&mut entries);
        if let Some(limit) = filters.limit {
            entries.truncate(limit);
        }

        tracing::debug!(count = entries.len(), "Fetched audit logs");
        Ok(entries)
    }

    /// All entries for one user id, newest first.
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let docs = self
            .store
            .query_eq(
                collections::AUDIT_LOGS,
                "userId",
                &serde_json::Value::String(user_id.to_string()),
            )
            .await?;

        let mut entries = parse_entries(docs);
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    /// The `limit` most recent entries.
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        self.query(&AuditFilters {
            limit: Some(limit),
            ..AuditFilters::default()
        })
        .await
    }

    /// Aggregate stats over the whole log, computed fresh on every call.
    pub async fn stats(&self) -> Result<AuditStats, StoreError> {
        let docs = self.store.list(collections::AUDIT_LOGS).await?;
        let entries = parse_entries(docs);
        Ok(AuditStats::from_entries(&entries))
    }
}

/// Deserialize entries, skipping (and logging) malformed documents.
fn parse_entries(docs: Vec<StoredDocument>) -> Vec<AuditEntry> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match doc.into_typed::<AuditEntry>() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(audit_id = %id, error = %e, "Skipping malformed audit entry");
                    None
                }
            }
        })
        .collect()
}

fn sort_newest_first(entries: &mut [AuditEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{AuditAction, Provider};
    use chrono::Duration;

    fn audit() -> (AuditLog, MemoryStore) {
        let store = MemoryStore::new();
        (AuditLog::new(Arc::new(store.clone())), store)
    }

    fn login(uid: &str, provider: Provider) -> AuditEvent {
        AuditEvent::new(AuditAction::Login, provider).identity(uid, "Name", &format!("{uid}@x.com"))
    }

    #[tokio::test]
    async fn test_append_returns_recorded_id() {
        let (log, store) = audit();
        let write = log
            .append(login("u1", Provider::Password), &ClientEnv::default())
            .await;
        assert!(write.is_recorded());
        assert_eq!(store.count(collections::AUDIT_LOGS).await, 1);

        let entries = log.query(&AuditFilters::default()).await.unwrap();
        assert_eq!(entries[0].id, write.id().unwrap());
    }

    #[tokio::test]
    async fn test_query_after_n_writes_returns_n() {
        let (log, _) = audit();
        for i in 0..5 {
            log.append(login(&format!("u{i}"), Provider::Google), &ClientEnv::default())
                .await;
        }
        assert_eq!(log.query(&AuditFilters::default()).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let (log, _) = audit();
        log.append(login("a", Provider::Password), &ClientEnv::default())
            .await;
        log.append(
            login("b", Provider::Google).failed("nope"),
            &ClientEnv::default(),
        )
        .await;
        log.append(login("c", Provider::Google), &ClientEnv::default())
            .await;

        let google = log
            .query(&AuditFilters {
                provider: Some(Provider::Google),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(google.len(), 2);
        assert!(google[0].timestamp >= google[1].timestamp);

        let failures = log
            .query(&AuditFilters {
                success: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].user_id, "b");

        let by_email = log
            .query(&AuditFilters {
                user_email: Some("c@x.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_email.len(), 1);

        let future = log
            .query(&AuditFilters {
                start: Some(Utc::now() + Duration::hours(1)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(future.is_empty());

        assert_eq!(log.recent(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_for_user() {
        let (log, _) = audit();
        log.append(login("a", Provider::Password), &ClientEnv::default())
            .await;
        log.append(login("a", Provider::Google), &ClientEnv::default())
            .await;
        log.append(login("b", Provider::Google), &ClientEnv::default())
            .await;

        let entries = log.for_user("a").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.user_id == "a"));
    }

    #[tokio::test]
    async fn test_append_to_offline_store_is_dropped() {
        let log = AuditLog::new(Arc::new(crate::db::FirestoreDb::new_mock()));
        let write = log
            .append(login("u1", Provider::Password), &ClientEnv::default())
            .await;
        assert!(matches!(write, AuditWrite::Dropped(_)));
        assert!(write.id().is_none());
    }
}
