// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication provider abstraction.
//!
//! The provider owns credential verification. This crate only sees the
//! identity it hands back (or the error code it rejects with).

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AuthError, AuthErrorKind};
use crate::models::Provider;

/// Account returned by password sign-up / sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordAccount {
    pub uid: String,
    pub email: String,
}

/// Identity produced by a federated sign-in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FederatedIdentity {
    pub uid: String,
    /// Empty when the provider did not release an email claim
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Outcome of the interactive sign-in surface, forwarded by the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum FederatedCredential {
    /// OIDC ID token (Google)
    IdToken(String),
    /// OAuth access token (GitHub, Facebook)
    AccessToken(String),
    /// The popup/redirect rejected with this client-side error code
    ClientError(String),
}

/// Error reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Taxonomy kind for this error's code.
    pub fn kind(&self) -> AuthErrorKind {
        kind_for_code(&self.code)
    }

    /// Map to a taxonomy error with a user-facing message.
    ///
    /// Unknown codes keep the provider's own message.
    pub fn into_auth_error(self, provider: Provider) -> AuthError {
        match self.kind() {
            AuthErrorKind::Unknown => {
                let message = if self.message.is_empty() {
                    AuthErrorKind::Unknown.message(provider)
                } else {
                    self.message
                };
                AuthError::new(AuthErrorKind::Unknown, message)
            }
            kind => AuthError::of(kind, provider),
        }
    }
}

/// Provider error code → taxonomy kind.
///
/// Covers both the client SDK codes (`auth/...`) the browser forwards and the
/// Identity Toolkit REST codes the server sees.
pub const PROVIDER_ERROR_CODES: &[(&str, AuthErrorKind)] = &[
    // Registration
    ("auth/email-already-in-use", AuthErrorKind::DuplicateEmail),
    ("EMAIL_EXISTS", AuthErrorKind::DuplicateEmail),
    (
        "auth/account-exists-with-different-credential",
        AuthErrorKind::DuplicateEmail,
    ),
    ("auth/weak-password", AuthErrorKind::WeakCredential),
    ("WEAK_PASSWORD", AuthErrorKind::WeakCredential),
    ("auth/invalid-email", AuthErrorKind::InvalidEmailFormat),
    ("INVALID_EMAIL", AuthErrorKind::InvalidEmailFormat),
    ("MISSING_EMAIL", AuthErrorKind::InvalidEmailFormat),
    // Sign-in
    ("auth/user-not-found", AuthErrorKind::UserNotFound),
    ("EMAIL_NOT_FOUND", AuthErrorKind::UserNotFound),
    ("USER_NOT_FOUND", AuthErrorKind::UserNotFound),
    ("auth/wrong-password", AuthErrorKind::WrongCredential),
    ("auth/invalid-credential", AuthErrorKind::WrongCredential),
    ("INVALID_PASSWORD", AuthErrorKind::WrongCredential),
    ("INVALID_LOGIN_CREDENTIALS", AuthErrorKind::WrongCredential),
    ("INVALID_IDP_RESPONSE", AuthErrorKind::WrongCredential),
    ("auth/user-disabled", AuthErrorKind::AccountDisabled),
    ("USER_DISABLED", AuthErrorKind::AccountDisabled),
    ("auth/too-many-requests", AuthErrorKind::RateLimited),
    ("TOO_MANY_ATTEMPTS_TRY_LATER", AuthErrorKind::RateLimited),
    // Password reset codes
    ("auth/expired-action-code", AuthErrorKind::WrongCredential),
    ("auth/invalid-action-code", AuthErrorKind::WrongCredential),
    ("EXPIRED_OOB_CODE", AuthErrorKind::WrongCredential),
    ("INVALID_OOB_CODE", AuthErrorKind::WrongCredential),
    // Interactive federated sign-in
    ("auth/popup-closed-by-user", AuthErrorKind::SignInCancelled),
    ("auth/cancelled-popup-request", AuthErrorKind::SignInCancelled),
    ("auth/user-cancelled", AuthErrorKind::SignInCancelled),
    ("auth/popup-blocked", AuthErrorKind::PopupBlocked),
    ("auth/unauthorized-domain", AuthErrorKind::UnauthorizedOrigin),
    ("auth/operation-not-allowed", AuthErrorKind::ProviderNotEnabled),
    ("OPERATION_NOT_ALLOWED", AuthErrorKind::ProviderNotEnabled),
    ("PASSWORD_LOGIN_DISABLED", AuthErrorKind::ProviderNotEnabled),
];

/// Look up the taxonomy kind for a provider error code.
pub fn kind_for_code(code: &str) -> AuthErrorKind {
    PROVIDER_ERROR_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, kind)| *kind)
        .unwrap_or(AuthErrorKind::Unknown)
}

/// External authentication service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create a password credential.
    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<PasswordAccount, ProviderError>;

    /// Verify a password credential.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<PasswordAccount, ProviderError>;

    /// Complete a federated sign-in from the client's credential.
    async fn sign_in_with_federated(
        &self,
        provider: Provider,
        credential: &FederatedCredential,
    ) -> Result<FederatedIdentity, ProviderError>;

    async fn send_password_reset_email(&self, email: &str) -> Result<(), ProviderError>;

    /// Check a reset code and return the email it belongs to.
    async fn verify_password_reset_code(&self, code: &str) -> Result<String, ProviderError>;

    async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError>;
}
