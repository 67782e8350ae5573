// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - identity, authentication and audit logic.

pub mod accounts;
pub mod audit;
pub mod auth_provider;
pub mod firebase_auth;
pub mod identity;

pub use accounts::AccountService;
pub use audit::{AuditLog, AuditWrite};
pub use auth_provider::{
    AuthProvider, FederatedCredential, FederatedIdentity, PasswordAccount, ProviderError,
};
pub use firebase_auth::FirebaseAuthClient;
pub use identity::{ExternalIdentity, IdentityResolver, ResolveError, ResolvedUser};
