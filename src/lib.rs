// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Bizadmin accounts: identity consolidation and audit logging
//!
//! This crate provides the backend API for a business-admin app that
//! authenticates users through Firebase (email/password, Google, GitHub,
//! Facebook), keeps one canonical user record per email in Firestore, and
//! records every authentication event in an append-only audit log.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::DocumentStore;
use services::{AccountService, AuditLog, AuthProvider};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub accounts: AccountService,
    pub audit: AuditLog,
}

impl AppState {
    /// Wire the services around an injected store and auth provider.
    pub fn new(config: Config, store: Arc<dyn DocumentStore>, auth: Arc<dyn AuthProvider>) -> Self {
        let accounts = AccountService::new(auth, store.clone());
        let audit = accounts.audit().clone();
        Self {
            config,
            store,
            accounts,
            audit,
        }
    }
}
