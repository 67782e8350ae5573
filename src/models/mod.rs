// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod audit;
pub mod stats;
pub mod user;

pub use audit::{AuditAction, AuditEntry, AuditEvent, AuditFilters, ClientEnv, MergeLink};
pub use stats::AuditStats;
pub use user::{LoginHistoryEntry, Provider, UserRecord};
