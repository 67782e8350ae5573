// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Audit log records.
//!
//! Entries are append-only: the application creates them and reads them
//! back for reporting, but never updates or deletes one.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::user::{Provider, UserRecord};

/// Kind of authentication event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Register,
    Login,
    AccountMerge,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Register => "register",
            AuditAction::Login => "login",
            AuditAction::AccountMerge => "account_merge",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(AuditAction::Register),
            "login" => Ok(AuditAction::Login),
            "account_merge" => Ok(AuditAction::AccountMerge),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// Client environment captured when an audit entry is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEnv {
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub ip_address: String,
}

impl ClientEnv {
    /// Extract client metadata from request headers.
    ///
    /// `platform` comes from the `Sec-CH-UA-Platform` client hint and
    /// `language` is the first tag of `Accept-Language`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
        };

        let language = get(header::ACCEPT_LANGUAGE.as_str())
            .split(',')
            .next()
            .and_then(|tag| tag.split(';').next())
            .unwrap_or("")
            .trim()
            .to_string();

        let ip_address = get("x-forwarded-for")
            .split(',')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        Self {
            user_agent: get(header::USER_AGENT.as_str()).to_string(),
            platform: get("sec-ch-ua-platform").trim_matches('"').to_string(),
            language,
            ip_address,
        }
    }
}

/// Stored audit log entry at `audit_logs/{auto}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Document ID (filled in when read back)
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub action: AuditAction,
    pub auth_provider: Provider,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub merged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_uid: Option<String>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub ip_address: String,
}

/// An authentication event waiting to be written.
///
/// The timestamp and client environment are attached by the audit log at
/// write time.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub action: AuditAction,
    pub provider: Provider,
    pub error_message: Option<String>,
    pub merge: Option<MergeLink>,
}

/// Uids involved in an account consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeLink {
    pub primary_uid: String,
    pub alternative_uid: String,
}

impl AuditEvent {
    pub fn new(action: AuditAction, provider: Provider) -> Self {
        Self {
            user_id: String::new(),
            user_name: String::new(),
            user_email: String::new(),
            action,
            provider,
            error_message: None,
            merge: None,
        }
    }

    pub fn user(mut self, user: &UserRecord) -> Self {
        self.user_id = user.id.clone();
        self.user_name = user.name.clone();
        self.user_email = user.email.clone();
        self
    }

    pub fn identity(mut self, uid: &str, name: &str, email: &str) -> Self {
        self.user_id = uid.to_string();
        self.user_name = name.to_string();
        self.user_email = email.to_string();
        self
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn merged(mut self, primary_uid: &str, alternative_uid: &str) -> Self {
        self.merge = Some(MergeLink {
            primary_uid: primary_uid.to_string(),
            alternative_uid: alternative_uid.to_string(),
        });
        self
    }

    /// Stamp the event into a storable entry.
    pub fn into_entry(self, timestamp: DateTime<Utc>, env: &ClientEnv) -> AuditEntry {
        let (primary_uid, alternative_uid) = match self.merge {
            Some(link) => (Some(link.primary_uid), Some(link.alternative_uid)),
            None => (None, None),
        };

        AuditEntry {
            id: String::new(),
            user_id: self.user_id,
            user_name: self.user_name,
            user_email: self.user_email,
            action: self.action,
            auth_provider: self.provider,
            timestamp,
            success: self.error_message.is_none(),
            merged: primary_uid.is_some(),
            error_message: self.error_message,
            primary_uid,
            alternative_uid,
            user_agent: env.user_agent.clone(),
            platform: env.platform.clone(),
            language: env.language.clone(),
            ip_address: env.ip_address.clone(),
        }
    }
}

/// In-memory filters applied to a full audit log scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilters {
    pub action: Option<AuditAction>,
    pub provider: Option<Provider>,
    pub success: Option<bool>,
    pub user_email: Option<String>,
    /// Case-insensitive substring over user name, email, id and action
    pub search: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilters {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.map_or(true, |a| entry.action == a)
            && self.provider.map_or(true, |p| entry.auth_provider == p)
            && self.success.map_or(true, |s| entry.success == s)
            && self
                .user_email
                .as_deref()
                .map_or(true, |email| entry.user_email == email)
            && self
                .search
                .as_deref()
                .map_or(true, |term| search_matches(entry, term))
            && self.start.map_or(true, |start| entry.timestamp >= start)
            && self.end.map_or(true, |end| entry.timestamp <= end)
    }
}

fn search_matches(entry: &AuditEntry, term: &str) -> bool {
    let term = term.to_lowercase();
    [
        entry.user_name.as_str(),
        entry.user_email.as_str(),
        entry.user_id.as_str(),
        entry.action.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&term))
}
