// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Identity provider that produced an authentication event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Password,
    Google,
    Github,
    Facebook,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Password,
        Provider::Google,
        Provider::Github,
        Provider::Facebook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Password => "password",
            Provider::Google => "google",
            Provider::Github => "github",
            Provider::Facebook => "facebook",
        }
    }

    /// Human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Password => "Email",
            Provider::Google => "Google",
            Provider::Github => "GitHub",
            Provider::Facebook => "Facebook",
        }
    }

    /// Firebase Authentication provider id (`google.com`, ...).
    pub fn firebase_id(&self) -> &'static str {
        match self {
            Provider::Password => "password",
            Provider::Google => "google.com",
            Provider::Github => "github.com",
            Provider::Facebook => "facebook.com",
        }
    }

    /// Whether this provider signs in through an interactive federated flow.
    pub fn is_federated(&self) -> bool {
        !matches!(self, Provider::Password)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// User profile stored in Firestore at `users/{id}`.
///
/// A record with `primary_uid` set is a secondary (per-provider shadow)
/// record; the referenced primary owns the canonical data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Provider-assigned subject id (also used as document ID)
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub providers: BTreeSet<Provider>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub last_login_at: DateTime<Utc>,
    /// Provider-specific uids minted for this person by other providers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alternative_uids: BTreeMap<Provider, String>,
    /// Back-reference to the primary record (secondary records only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_uid: Option<String>,
}

impl UserRecord {
    /// Build a fresh primary record for a first-time person.
    pub fn new_primary(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        photo_url: Option<String>,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            photo_url: photo_url.filter(|url| !url.is_empty()),
            providers: BTreeSet::from([provider]),
            created_at: now,
            last_login_at: now,
            alternative_uids: BTreeMap::new(),
            primary_uid: None,
        }
    }

    /// Mirror of this (primary) record stored under another provider's uid.
    pub fn secondary_for(&self, alternative_uid: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: alternative_uid.into(),
            name: self.name.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
            providers: self.providers.clone(),
            created_at: self.created_at,
            last_login_at: now,
            alternative_uids: BTreeMap::new(),
            primary_uid: Some(self.id.clone()),
        }
    }

    pub fn is_secondary(&self) -> bool {
        self.primary_uid.is_some()
    }

    /// Set-union the provider tag. Returns `true` if it was newly added.
    pub fn add_provider(&mut self, provider: Provider) -> bool {
        self.providers.insert(provider)
    }

    /// Fill in the avatar only when none is stored yet.
    ///
    /// Returns `true` if the stored value changed.
    pub fn refresh_photo(&mut self, incoming: Option<&str>) -> bool {
        let stored_empty = self.photo_url.as_deref().map_or(true, str::is_empty);
        match incoming {
            Some(url) if stored_empty && !url.is_empty() => {
                self.photo_url = Some(url.to_string());
                true
            }
            _ => false,
        }
    }

    /// Whether `uid` is this record's key or one of its linked provider uids.
    pub fn owns_uid(&self, uid: &str) -> bool {
        self.id == uid || self.alternative_uids.values().any(|alt| alt == uid)
    }
}

/// Per-user login history entry at `users/{id}/login_history/{auto}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginHistoryEntry {
    pub login_at: DateTime<Utc>,
}
