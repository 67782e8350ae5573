// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Audit log statistics over a populated store.

use bizadmin_accounts::db::{FirestoreDb, MemoryStore};
use bizadmin_accounts::models::{AuditAction, AuditEvent, ClientEnv, Provider};
use bizadmin_accounts::services::AuditLog;
use std::sync::Arc;

mod common;
use common::{test_accounts, token};

#[tokio::test]
async fn test_success_rate_three_of_four() {
    let log = AuditLog::new(Arc::new(MemoryStore::new()));
    let env = ClientEnv::default();

    for uid in ["a", "b", "c"] {
        log.append(
            AuditEvent::new(AuditAction::Login, Provider::Password).identity(
                uid,
                uid,
                &format!("{uid}@example.com"),
            ),
            &env,
        )
        .await;
    }
    log.append(
        AuditEvent::new(AuditAction::Login, Provider::Google)
            .identity("d", "d", "d@example.com")
            .failed("Incorrect credentials"),
        &env,
    )
    .await;

    let stats = log.stats().await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.success_count, 3);
    assert_eq!(stats.failure_count, 1);
    assert_eq!(stats.success_rate, 75.0);
    assert_eq!(stats.by_provider.get("password"), Some(&3));
    assert_eq!(stats.by_provider.get("google"), Some(&1));
}

#[tokio::test]
async fn test_stats_after_merge_flow() {
    let (accounts, _, auth) = test_accounts();
    let env = ClientEnv::default();

    accounts
        .register("Alice", "alice@example.com", "hunter22", &env)
        .await
        .unwrap();
    auth.set_federated(Provider::Google, "g-1", "alice@example.com", "Alice");
    accounts.login_with_google(&token(), &env).await.unwrap();
    accounts
        .login("alice@example.com", "wrong", &env)
        .await
        .unwrap_err();

    let stats = accounts.audit().stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.merged_accounts, 1);
    assert_eq!(stats.by_action.get("register"), Some(&1));
    assert_eq!(stats.by_action.get("account_merge"), Some(&1));
    assert_eq!(stats.by_action.get("login"), Some(&1));
    assert_eq!(stats.by_user.get("alice@example.com"), Some(&3));
    assert_eq!(stats.success_rate, 66.67);

    let alice = accounts.audit().for_user("pw-0").await.unwrap();
    assert_eq!(alice.len(), 2);
}

#[tokio::test]
async fn test_empty_log() {
    let log = AuditLog::new(Arc::new(MemoryStore::new()));
    let stats = log.stats().await.unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.success_rate, 0.0);
}

#[tokio::test]
async fn test_stats_on_offline_store_errors() {
    let log = AuditLog::new(Arc::new(FirestoreDb::new_mock()));
    assert!(log.stats().await.is_err());
}
