//! Audit statistics computed from a full scan of the audit log.
//!
//! Nothing is maintained incrementally in storage: every call folds the
//! complete log into a fresh `AuditStats`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::AuditEntry;

/// Aggregate counts over the audit log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    // ─── Totals ──────────────────────────────────────────────────
    pub total: u32,
    pub success_count: u32,
    pub failure_count: u32,
    /// Percentage of successful entries, rounded to two decimals
    pub success_rate: f64,
    /// Entries that performed an account consolidation
    pub merged_accounts: u32,

    // ─── Breakdowns ──────────────────────────────────────────────
    /// Count per action ("register", "login", "account_merge")
    pub by_action: BTreeMap<String, u32>,
    /// Count per provider tag
    pub by_provider: BTreeMap<String, u32>,
    /// Count per user email (entries without an email are skipped)
    pub by_user: BTreeMap<String, u32>,
}

impl AuditStats {
    /// Fold a sequence of entries into stats.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a AuditEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.record(entry);
        }
        stats.success_rate = success_rate(stats.success_count, stats.total);
        stats
    }

    fn record(&mut self, entry: &AuditEntry) {
        self.total += 1;

        *self
            .by_action
            .entry(entry.action.as_str().to_string())
            .or_insert(0) += 1;
        *self
            .by_provider
            .entry(entry.auth_provider.as_str().to_string())
            .or_insert(0) += 1;

        if !entry.user_email.is_empty() {
            *self.by_user.entry(entry.user_email.clone()).or_insert(0) += 1;
        }

        if entry.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }

        if entry.merged {
            self.merged_accounts += 1;
        }
    }
}

/// Success percentage rounded to two decimals; zero for an empty log.
fn success_rate(successes: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = f64::from(successes) / f64::from(total) * 100.0;
    (pct * 100.0).round() / 100.0
}
