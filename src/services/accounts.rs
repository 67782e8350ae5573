// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential and federated authentication flows.
//!
//! This is the boundary where provider error codes become taxonomy errors.
//! Successful authentications are handed to the [`IdentityResolver`].

use std::sync::Arc;

use crate::db::{collections, DocumentStore, StoreError};
use crate::error::{AuthError, AuthErrorKind};
use crate::models::{AuditAction, AuditEvent, ClientEnv, Provider, UserRecord};
use crate::services::audit::AuditLog;
use crate::services::auth_provider::{
    AuthProvider, FederatedCredential, FederatedIdentity, ProviderError,
};
use crate::services::identity::{ExternalIdentity, IdentityResolver, ResolvedUser};

/// Account operations exposed to the HTTP layer.
#[derive(Clone)]
pub struct AccountService {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    resolver: IdentityResolver,
    audit: AuditLog,
}

impl AccountService {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn DocumentStore>) -> Self {
        let audit = AuditLog::new(store.clone());
        Self {
            auth,
            resolver: IdentityResolver::new(store.clone(), audit.clone()),
            store,
            audit,
        }
    }

    /// Create a password account and its user record.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, AuthError> {
        let account = match self.auth.sign_up_with_password(email, password).await {
            Ok(account) => account,
            Err(e) => {
                return Err(self
                    .provider_failure(e, AuditAction::Register, Provider::Password, name, email, env)
                    .await)
            }
        };

        let identity = ExternalIdentity {
            uid: account.uid,
            email: account.email,
            display_name: Some(name.to_string()),
            photo_url: None,
        };
        Ok(self
            .resolver
            .resolve(&identity, Provider::Password, env)
            .await?)
    }

    /// Verify a password credential and record the sign-in.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, AuthError> {
        let account = match self.auth.sign_in_with_password(email, password).await {
            Ok(account) => account,
            Err(e) => {
                return Err(self
                    .provider_failure(e, AuditAction::Login, Provider::Password, "", email, env)
                    .await)
            }
        };

        let identity = ExternalIdentity {
            uid: account.uid,
            email: if account.email.is_empty() {
                email.to_string()
            } else {
                account.email
            },
            display_name: None,
            photo_url: None,
        };
        Ok(self
            .resolver
            .login_existing(&identity, Provider::Password, env)
            .await?)
    }

    /// Complete a federated sign-in and resolve the identity.
    pub async fn login_with_provider(
        &self,
        provider: Provider,
        credential: &FederatedCredential,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, AuthError> {
        let identity = self.federated_identity(provider, credential, env).await?;

        // Without an email there is nothing to match on, so fail before any write.
        if identity.email.is_empty() {
            tracing::info!(%provider, uid = %identity.uid, "Provider released no email");
            return Err(AuthError::of(AuthErrorKind::MissingProviderEmail, provider));
        }

        Ok(self
            .resolver
            .resolve(&external(identity), provider, env)
            .await?)
    }

    pub async fn login_with_google(
        &self,
        credential: &FederatedCredential,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, AuthError> {
        self.login_with_provider(Provider::Google, credential, env)
            .await
    }

    pub async fn login_with_github(
        &self,
        credential: &FederatedCredential,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, AuthError> {
        self.login_with_provider(Provider::Github, credential, env)
            .await
    }

    pub async fn login_with_facebook(
        &self,
        credential: &FederatedCredential,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, AuthError> {
        self.login_with_provider(Provider::Facebook, credential, env)
            .await
    }

    /// Link another federated provider to the signed-in user.
    pub async fn link_provider(
        &self,
        current_uid: &str,
        provider: Provider,
        credential: &FederatedCredential,
        env: &ClientEnv,
    ) -> Result<ResolvedUser, AuthError> {
        let identity = self.federated_identity(provider, credential, env).await?;
        Ok(self
            .resolver
            .link(current_uid, &external(identity), provider, env)
            .await?)
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.auth
            .send_password_reset_email(email)
            .await
            .map_err(|e| e.into_auth_error(Provider::Password))?;
        tracing::info!("Password reset email requested");
        Ok(())
    }

    /// Returns the email address the reset code was issued for.
    pub async fn verify_password_reset_code(&self, code: &str) -> Result<String, AuthError> {
        self.auth
            .verify_password_reset_code(code)
            .await
            .map_err(|e| e.into_auth_error(Provider::Password))
    }

    pub async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.auth
            .confirm_password_reset(code, new_password)
            .await
            .map_err(|e| e.into_auth_error(Provider::Password))?;
        tracing::info!("Password reset confirmed");
        Ok(())
    }

    /// Every stored user record, secondaries included, oldest first.
    pub async fn get_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let docs = self.store.list(collections::USERS).await?;
        let mut users = docs
            .into_iter()
            .map(|doc| doc.into_typed::<UserRecord>())
            .collect::<Result<Vec<_>, _>>()?;
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    pub async fn get_user_by_uid(&self, uid: &str) -> Result<Option<UserRecord>, StoreError> {
        match self.store.get(collections::USERS, uid).await? {
            Some(doc) => Ok(Some(doc.into_typed()?)),
            None => Ok(None),
        }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Run the interactive sign-in and map any rejection.
    ///
    /// Cancellation is logged only. Other rejections get a best-effort
    /// failed `login` entry.
    async fn federated_identity(
        &self,
        provider: Provider,
        credential: &FederatedCredential,
        env: &ClientEnv,
    ) -> Result<FederatedIdentity, AuthError> {
        if !provider.is_federated() {
            return Err(AuthError::of(AuthErrorKind::ProviderNotEnabled, provider));
        }

        match self.auth.sign_in_with_federated(provider, credential).await {
            Ok(identity) => Ok(identity),
            Err(e) if e.kind() == AuthErrorKind::SignInCancelled => {
                tracing::info!(%provider, code = %e.code, "Sign-in cancelled by user");
                Err(e.into_auth_error(provider))
            }
            Err(e) => Err(self
                .provider_failure(e, AuditAction::Login, provider, "", "", env)
                .await),
        }
    }

    async fn provider_failure(
        &self,
        error: ProviderError,
        action: AuditAction,
        provider: Provider,
        name: &str,
        email: &str,
        env: &ClientEnv,
    ) -> AuthError {
        tracing::warn!(
            %provider,
            %action,
            code = %error.code,
            "Provider rejected authentication"
        );
        let err = error.into_auth_error(provider);
        self.audit
            .append(
                AuditEvent::new(action, provider)
                    .identity("", name, email)
                    .failed(err.message.clone()),
                env,
            )
            .await;
        err
    }
}

fn external(identity: FederatedIdentity) -> ExternalIdentity {
    ExternalIdentity {
        uid: identity.uid,
        email: identity.email,
        display_name: identity.display_name,
        photo_url: identity.photo_url,
    }
}
