// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity resolution and account consolidation.
//!
//! Every successful authentication ends up here. The resolver decides
//! whether the identity belongs to a new person, a returning user, or a
//! known person arriving through a new provider, and keeps one primary
//! `users` record per email:
//!
//! ```text
//! users/{uid}          found      -> returning user (login)
//! users where email==  none       -> new primary (register)
//! users where email==  found      -> merge: update primary, create secondary
//! ```
//!
//! The merge is two sequential writes with no transaction. If the primary
//! update lands and the secondary create fails, the error is returned and
//! the primary keeps its new provider linkage.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::db::{collections, to_document, DocumentStore, StoreError};
use crate::error::{AuthError, AuthErrorKind};
use crate::models::{AuditAction, AuditEvent, ClientEnv, LoginHistoryEntry, Provider, UserRecord};
use crate::services::audit::{AuditLog, AuditWrite};

/// Freshly authenticated external identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExternalIdentity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Canonical user produced by a resolution.
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    /// Always the primary record
    pub user: UserRecord,
    /// True only when this call consolidated a new provider
    pub merged: bool,
    /// True when this call created the primary record
    pub created: bool,
    /// Outcome of the best-effort audit write
    pub audit: AuditWrite,
}

/// Resolver failures. Store errors propagate unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no user record for authenticated uid {0}")]
    MissingRecord(String),

    #[error("user record {secondary} points at missing primary {primary}")]
    DanglingSecondary { secondary: String, primary: String },

    #[error("this {provider} account is already linked to another user")]
    AlreadyLinked { provider: Provider, uid: String },
}

impl From<ResolveError> for AuthError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Store(err) => err.into(),
            other => AuthError::new(AuthErrorKind::Unknown, other.to_string()),
        }
    }
}

/// Which bookkeeping path a resolution reached (drives the failure audit).
#[derive(Clone, Copy)]
struct Stage(AuditAction);

/// Identity resolver over an injected document store.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn DocumentStore>,
    audit: AuditLog,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn DocumentStore>, audit: AuditLog) -> Self {
        Self { store, audit }
    }

    /// Resolve an authenticated identity into the canonical user record.
    pub async fn resolve(
        &self,
        identity: &ExternalIdentity,
        provider: Provider,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, ResolveError> {
        let mut stage = Stage(AuditAction::Login);
        let result = self.try_resolve(identity, provider, env, &mut stage).await;
        self.audit_failure(result, identity, provider, stage, env)
            .await
    }

    /// Record a sign-in for a uid that must already have a user record.
    ///
    /// Used by password login: registration always writes the record first,
    /// so a missing one is an inconsistency, not a new user.
    pub async fn login_existing(
        &self,
        identity: &ExternalIdentity,
        provider: Provider,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, ResolveError> {
        let stage = Stage(AuditAction::Login);
        let result: Result<ResolvedUser, ResolveError> = async {
            let user = self
                .load_user(&identity.uid)
                .await?
                .ok_or_else(|| ResolveError::MissingRecord(identity.uid.clone()))?;
            let primary = self.primary_of(user).await?;
            self.returning(primary, identity, provider, env).await
        }
        .await;
        self.audit_failure(result, identity, provider, stage, env)
            .await
    }

    /// Link another provider's identity to the signed-in user's primary.
    ///
    /// Re-linking an identity the primary already owns is a no-op.
    pub async fn link(
        &self,
        current_uid: &str,
        identity: &ExternalIdentity,
        provider: Provider,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, ResolveError> {
        let stage = Stage(AuditAction::AccountMerge);
        let result: Result<ResolvedUser, ResolveError> = async {
            let current = self
                .load_user(current_uid)
                .await?
                .ok_or_else(|| ResolveError::MissingRecord(current_uid.to_string()))?;
            let primary = self.primary_of(current).await?;

            if primary.owns_uid(&identity.uid) {
                tracing::debug!(uid = %primary.id, %provider, "Provider already linked");
                return Ok(ResolvedUser {
                    user: primary,
                    merged: false,
                    created: false,
                    audit: AuditWrite::Skipped,
                });
            }

            if self.load_user(&identity.uid).await?.is_some() {
                return Err(ResolveError::AlreadyLinked {
                    provider,
                    uid: identity.uid.clone(),
                });
            }

            self.merge(primary, identity, provider, env).await
        }
        .await;
        self.audit_failure(result, identity, provider, stage, env)
            .await
    }

    async fn try_resolve(
        &self,
        identity: &ExternalIdentity,
        provider: Provider,
        env: &ClientEnv,
        stage: &mut Stage,
    ) -> Result<ResolvedUser, ResolveError> {
        // 1. Known uid: returning user on a provider it already used.
        if let Some(user) = self.load_user(&identity.uid).await? {
            let primary = self.primary_of(user).await?;
            return self.returning(primary, identity, provider, env).await;
        }

        // 2. Unknown uid: look for the same person by exact email.
        *stage = Stage(AuditAction::Register);
        match self.find_primary_by_email(&identity.email).await? {
            None => self.register(identity, provider, env).await,
            Some(primary) => {
                *stage = Stage(AuditAction::AccountMerge);
                self.merge(primary, identity, provider, env).await
            }
        }
    }

    async fn returning(
        &self,
        mut primary: UserRecord,
        identity: &ExternalIdentity,
        provider: Provider,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, ResolveError> {
        primary.add_provider(provider);
        primary.refresh_photo(identity.photo_url.as_deref());
        primary.last_login_at = Utc::now();

        self.store
            .update(
                collections::USERS,
                &primary.id,
                pick_fields(&primary, &["providers", "lastLoginAt", "photoUrl"])?,
            )
            .await?;

        let audit = self
            .audit
            .append(
                AuditEvent::new(AuditAction::Login, provider).user(&primary),
                env,
            )
            .await;
        self.record_login(&primary.id).await;

        tracing::info!(uid = %primary.id, %provider, "Returning user signed in");

        Ok(ResolvedUser {
            user: primary,
            merged: false,
            created: false,
            audit,
        })
    }

    async fn register(
        &self,
        identity: &ExternalIdentity,
        provider: Provider,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, ResolveError> {
        let user = UserRecord::new_primary(
            identity.uid.clone(),
            display_name_for(identity, provider),
            identity.email.clone(),
            identity.photo_url.clone(),
            provider,
            Utc::now(),
        );

        self.store
            .create(collections::USERS, Some(&user.id), to_document(&user)?)
            .await?;

        let audit = self
            .audit
            .append(
                AuditEvent::new(AuditAction::Register, provider).user(&user),
                env,
            )
            .await;
        self.record_login(&user.id).await;

        tracing::info!(uid = %user.id, %provider, "New user registered");

        Ok(ResolvedUser {
            user,
            merged: false,
            created: true,
            audit,
        })
    }

    async fn merge(
        &self,
        mut primary: UserRecord,
        identity: &ExternalIdentity,
        provider: Provider,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, ResolveError> {
        let now = Utc::now();

        // a. Link the provider on the primary.
        primary.add_provider(provider);
        primary
            .alternative_uids
            .insert(provider, identity.uid.clone());
        primary.refresh_photo(identity.photo_url.as_deref());
        primary.last_login_at = now;

        self.store
            .update(
                collections::USERS,
                &primary.id,
                pick_fields(
                    &primary,
                    &["providers", "alternativeUids", "lastLoginAt", "photoUrl"],
                )?,
            )
            .await?;

        // b. Shadow record under the new provider's uid. Create-if-absent,
        //    so a racing duplicate merge fails here instead of overwriting.
        let secondary = primary.secondary_for(identity.uid.clone(), now);
        self.store
            .create(
                collections::USERS,
                Some(&secondary.id),
                to_document(&secondary)?,
            )
            .await?;

        // c. One audit entry for the consolidation.
        let audit = self
            .audit
            .append(
                AuditEvent::new(AuditAction::AccountMerge, provider)
                    .user(&primary)
                    .merged(&primary.id, &identity.uid),
                env,
            )
            .await;
        self.record_login(&primary.id).await;

        tracing::info!(
            primary_uid = %primary.id,
            alternative_uid = %identity.uid,
            %provider,
            "Accounts merged"
        );

        Ok(ResolvedUser {
            user: primary,
            merged: true,
            created: false,
            audit,
        })
    }

    async fn load_user(&self, uid: &str) -> Result<Option<UserRecord>, ResolveError> {
        match self.store.get(collections::USERS, uid).await? {
            Some(doc) => Ok(Some(doc.into_typed()?)),
            None => Ok(None),
        }
    }

    /// Follow a secondary record's back-reference to its primary.
    async fn primary_of(&self, user: UserRecord) -> Result<UserRecord, ResolveError> {
        let Some(primary_uid) = user.primary_uid.clone() else {
            return Ok(user);
        };
        self.load_user(&primary_uid)
            .await?
            .ok_or(ResolveError::DanglingSecondary {
                secondary: user.id,
                primary: primary_uid,
            })
    }

    /// Exact, case-sensitive email lookup returning the primary record.
    ///
    /// Secondary records carry the same email, so they are skipped in favour
    /// of a primary, or followed to one when only secondaries match.
    async fn find_primary_by_email(&self, email: &str) -> Result<Option<UserRecord>, ResolveError> {
        let docs = self
            .store
            .query_eq(collections::USERS, "email", &Value::String(email.to_string()))
            .await?;

        let mut users = docs
            .into_iter()
            .map(|doc| doc.into_typed::<UserRecord>())
            .collect::<Result<Vec<_>, _>>()?;

        if users.len() > 1 {
            tracing::debug!(count = users.len(), "Multiple user records share an email");
        }

        users.sort_by_key(|u| u.created_at);
        if let Some(pos) = users.iter().position(|u| !u.is_secondary()) {
            return Ok(Some(users.swap_remove(pos)));
        }
        match users.into_iter().next() {
            Some(secondary) => self.primary_of(secondary).await.map(Some),
            None => Ok(None),
        }
    }

    /// Best-effort login history append under `users/{uid}/login_history`.
    async fn record_login(&self, uid: &str) {
        let entry = LoginHistoryEntry {
            login_at: Utc::now(),
        };
        let data = match to_document(&entry) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(uid, error = %e, "Failed to encode login history entry");
                return;
            }
        };
        if let Err(e) = self
            .store
            .create(&collections::login_history(uid), None, data)
            .await
        {
            tracing::warn!(uid, error = %e, "Failed to record login history");
        }
    }

    /// Audit a failed resolution, then hand the result back unchanged.
    async fn audit_failure(
        &self,
        result: Result<ResolvedUser, ResolveError>,
        identity: &ExternalIdentity,
        provider: Provider,
        stage: Stage,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, ResolveError> {
        if let Err(e) = &result {
            tracing::error!(
                uid = %identity.uid,
                %provider,
                action = %stage.0,
                error = %e,
                "Identity resolution failed"
            );
            let name = identity.display_name.as_deref().unwrap_or("");
            self.audit
                .append(
                    AuditEvent::new(stage.0, provider)
                        .identity(&identity.uid, name, &identity.email)
                        .failed(e.to_string()),
                    env,
                )
                .await;
        }
        result
    }
}

/// Name for a new record: display name, else email local part, else a
/// provider placeholder.
fn display_name_for(identity: &ExternalIdentity, provider: Provider) -> String {
    if let Some(name) = identity.display_name.as_deref().filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match identity.email.split('@').next().filter(|s| !s.is_empty()) {
        Some(local) => local.to_string(),
        None => format!("{} user", provider.display_name()),
    }
}

/// Serialize `user` and keep only the listed top-level fields.
fn pick_fields(user: &UserRecord, fields: &[&str]) -> Result<Value, StoreError> {
    let mut doc = to_document(user)?;
    if let Some(map) = doc.as_object_mut() {
        map.retain(|k, _| fields.contains(&k.as_str()));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn resolver() -> (IdentityResolver, MemoryStore) {
        let store = MemoryStore::new();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        (
            IdentityResolver::new(shared.clone(), AuditLog::new(shared)),
            store,
        )
    }

    fn identity(uid: &str, email: &str) -> ExternalIdentity {
        ExternalIdentity {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: Some("Alice".to_string()),
            photo_url: None,
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut id = identity("u", "bob@example.com");
        id.display_name = None;
        assert_eq!(display_name_for(&id, Provider::Google), "bob");

        id.email = String::new();
        assert_eq!(display_name_for(&id, Provider::Github), "GitHub user");

        id.display_name = Some(String::new());
        assert_eq!(display_name_for(&id, Provider::Facebook), "Facebook user");
    }

    #[test]
    fn test_pick_fields() {
        let user = UserRecord::new_primary("u", "A", "a@x.com", None, Provider::Password, Utc::now());
        let fields = pick_fields(&user, &["providers", "lastLoginAt", "photoUrl"]).unwrap();
        let map = fields.as_object().unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("providers"));
        assert!(map.contains_key("lastLoginAt"));
    }

    #[tokio::test]
    async fn test_new_email_creates_primary() {
        let (resolver, store) = resolver();
        let resolved = resolver
            .resolve(
                &identity("g1", "alice@example.com"),
                Provider::Google,
                &ClientEnv::default(),
            )
            .await
            .unwrap();

        assert!(resolved.created);
        assert!(!resolved.merged);
        assert_eq!(resolved.user.id, "g1");
        assert_eq!(resolved.user.providers.len(), 1);
        assert!(resolved.user.providers.contains(&Provider::Google));
        assert_eq!(store.count(collections::USERS).await, 1);
        assert_eq!(store.count(&collections::login_history("g1")).await, 1);
    }

    #[tokio::test]
    async fn test_repeat_resolve_does_not_grow_providers() {
        let (resolver, _) = resolver();
        let id = identity("g1", "alice@example.com");
        let first = resolver
            .resolve(&id, Provider::Google, &ClientEnv::default())
            .await
            .unwrap();
        let second = resolver
            .resolve(&id, Provider::Google, &ClientEnv::default())
            .await
            .unwrap();

        assert_eq!(second.user.providers, first.user.providers);
        assert_eq!(second.user.created_at, first.user.created_at);
        assert!(second.user.last_login_at >= first.user.last_login_at);
        assert!(!second.created);
    }

    #[tokio::test]
    async fn test_email_match_is_case_sensitive() {
        let (resolver, store) = resolver();
        resolver
            .resolve(
                &identity("pw1", "alice@example.com"),
                Provider::Password,
                &ClientEnv::default(),
            )
            .await
            .unwrap();
        let other = resolver
            .resolve(
                &identity("g1", "Alice@example.com"),
                Provider::Google,
                &ClientEnv::default(),
            )
            .await
            .unwrap();

        assert!(other.created);
        assert!(!other.merged);
        assert_eq!(store.count(collections::USERS).await, 2);
    }

    #[tokio::test]
    async fn test_login_existing_requires_record() {
        let (resolver, _) = resolver();
        let err = resolver
            .login_existing(
                &identity("ghost", "ghost@example.com"),
                Provider::Password,
                &ClientEnv::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MissingRecord(uid) if uid == "ghost"));
    }
}
