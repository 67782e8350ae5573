// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use bizadmin_accounts::config::Config;
use bizadmin_accounts::db::{DocumentStore, FirestoreDb, MemoryStore, StoreError, StoredDocument};
use bizadmin_accounts::models::Provider;
use bizadmin_accounts::routes::create_router;
use bizadmin_accounts::services::{
    AccountService, AuthProvider, FederatedCredential, FederatedIdentity, PasswordAccount,
    ProviderError,
};
use bizadmin_accounts::AppState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Unique suffix for emulator test isolation.
#[allow(dead_code)]
pub fn unique_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
        .to_string()
}

// ─── Auth provider double ────────────────────────────────────

struct StubAccount {
    uid: String,
    password: String,
}

/// In-process stand-in for Firebase Authentication.
///
/// Password accounts live in a map; federated sign-ins return whatever
/// identity was registered for the provider.
#[derive(Default)]
pub struct StubAuthProvider {
    accounts: Mutex<HashMap<String, StubAccount>>,
    federated: Mutex<HashMap<Provider, FederatedIdentity>>,
    reset_codes: Mutex<HashMap<String, String>>,
    next_uid: AtomicUsize,
}

#[allow(dead_code)]
impl StubAuthProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Identity returned by the next sign-ins with `provider`.
    pub fn set_federated(&self, provider: Provider, uid: &str, email: &str, name: &str) {
        self.federated.lock().unwrap().insert(
            provider,
            FederatedIdentity {
                uid: uid.to_string(),
                email: email.to_string(),
                display_name: Some(name.to_string()),
                photo_url: Some(format!("https://img.example.com/{uid}.png")),
            },
        );
    }

    /// Password credential that exists at the provider only.
    pub fn add_password_account(&self, email: &str, password: &str) -> String {
        let uid = self.fresh_uid();
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            StubAccount {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        uid
    }

    pub fn add_reset_code(&self, code: &str, email: &str) {
        self.reset_codes
            .lock()
            .unwrap()
            .insert(code.to_string(), email.to_string());
    }

    pub fn password_of(&self, email: &str) -> Option<String> {
        self.accounts
            .lock()
            .unwrap()
            .get(email)
            .map(|a| a.password.clone())
    }

    fn fresh_uid(&self) -> String {
        format!("pw-{}", self.next_uid.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl AuthProvider for StubAuthProvider {
    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<PasswordAccount, ProviderError> {
        if !email.contains('@') {
            return Err(ProviderError::new("INVALID_EMAIL", "bad email"));
        }
        if password.len() < 6 {
            return Err(ProviderError::new("WEAK_PASSWORD", "too short"));
        }
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(ProviderError::new("EMAIL_EXISTS", "exists"));
        }
        let uid = self.add_password_account(email, password);
        Ok(PasswordAccount {
            uid,
            email: email.to_string(),
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<PasswordAccount, ProviderError> {
        let accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get(email)
            .ok_or_else(|| ProviderError::new("EMAIL_NOT_FOUND", "no such user"))?;
        if account.password != password {
            return Err(ProviderError::new("INVALID_PASSWORD", "wrong password"));
        }
        Ok(PasswordAccount {
            uid: account.uid.clone(),
            email: email.to_string(),
        })
    }

    async fn sign_in_with_federated(
        &self,
        provider: Provider,
        credential: &FederatedCredential,
    ) -> Result<FederatedIdentity, ProviderError> {
        if let FederatedCredential::ClientError(code) = credential {
            return Err(ProviderError::new(code.clone(), ""));
        }
        self.federated
            .lock()
            .unwrap()
            .get(&provider)
            .cloned()
            .ok_or_else(|| ProviderError::new("INVALID_IDP_RESPONSE", "unknown credential"))
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), ProviderError> {
        if self.accounts.lock().unwrap().contains_key(email) {
            Ok(())
        } else {
            Err(ProviderError::new("EMAIL_NOT_FOUND", "no such user"))
        }
    }

    async fn verify_password_reset_code(&self, code: &str) -> Result<String, ProviderError> {
        self.reset_codes
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| ProviderError::new("INVALID_OOB_CODE", "bad code"))
    }

    async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError> {
        let email = self
            .reset_codes
            .lock()
            .unwrap()
            .remove(code)
            .ok_or_else(|| ProviderError::new("EXPIRED_OOB_CODE", "expired"))?;
        if let Some(account) = self.accounts.lock().unwrap().get_mut(&email) {
            account.password = new_password.to_string();
        }
        Ok(())
    }
}

/// Credential the stub accepts for any configured provider.
#[allow(dead_code)]
pub fn token() -> FederatedCredential {
    FederatedCredential::IdToken("stub-token".to_string())
}

// ─── Store double ────────────────────────────────────────────

/// Memory store whose writes to one collection fail.
#[derive(Clone)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_creates: Option<String>,
    fail_updates: Option<String>,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_creates: None,
            fail_updates: None,
        }
    }

    pub fn fail_creates_in(mut self, collection: &str) -> Self {
        self.fail_creates = Some(collection.to_string());
        self
    }

    pub fn fail_updates_in(mut self, collection: &str) -> Self {
        self.fail_updates = Some(collection.to_string());
        self
    }

    fn check(rule: &Option<String>, collection: &str) -> Result<(), StoreError> {
        match rule {
            Some(c) if c == collection => Err(StoreError::Unavailable(format!(
                "injected write failure on {collection}"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.inner.get(collection, key).await
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.query_eq(collection, field, value).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.list(collection).await
    }

    async fn create(
        &self,
        collection: &str,
        key: Option<&str>,
        data: Value,
    ) -> Result<String, StoreError> {
        Self::check(&self.fail_creates, collection)?;
        self.inner.create(collection, key, data).await
    }

    async fn update(&self, collection: &str, key: &str, fields: Value) -> Result<(), StoreError> {
        Self::check(&self.fail_updates, collection)?;
        self.inner.update(collection, key, fields).await
    }
}

// ─── App builders ────────────────────────────────────────────

/// Account service over a fresh memory store and stub provider.
#[allow(dead_code)]
pub fn test_accounts() -> (AccountService, MemoryStore, Arc<StubAuthProvider>) {
    let store = MemoryStore::new();
    let auth = StubAuthProvider::new();
    let accounts = AccountService::new(auth.clone(), Arc::new(store.clone()));
    (accounts, store, auth)
}

/// Full test app wired to in-process doubles.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub auth: Arc<StubAuthProvider>,
}

#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let store = MemoryStore::new();
    let auth = StubAuthProvider::new();
    let state = Arc::new(AppState::new(
        Config::test_default(),
        Arc::new(store.clone()),
        auth.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        auth,
    }
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(uid: &str, signing_key: &[u8]) -> String {
    bizadmin_accounts::middleware::auth::create_jwt(uid, signing_key).unwrap()
}
