// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AuditAction, AuditEntry, AuditFilters, AuditStats, ClientEnv, UserRecord};
use crate::routes::auth::{parse_federated_provider, FederatedRequest};
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339, DateRangePreset};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Upper bound on `limit` for audit log queries.
const MAX_AUDIT_LIMIT: usize = 1000;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/users", get(get_users))
        .route("/api/users/{uid}", get(get_user))
        .route("/api/account/providers/{provider}", post(link_provider))
        .route("/api/audit/logs", get(get_audit_logs))
        .route("/api/audit/users/{uid}", get(get_user_audit_logs))
        .route("/api/audit/stats", get(get_audit_stats))
}

// ─── Users ───────────────────────────────────────────────────

/// User record as returned to the admin UI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub providers: Vec<String>,
    pub created_at: String,
    pub last_login_at: String,
    /// Provider tag → uid of each linked identity (primary records only)
    pub alternative_uids: BTreeMap<String, String>,
    /// Set on secondary records
    pub primary_uid: Option<String>,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            photo_url: user.photo_url.clone(),
            providers: user.providers.iter().map(|p| p.to_string()).collect(),
            created_at: format_utc_rfc3339(user.created_at),
            last_login_at: format_utc_rfc3339(user.last_login_at),
            alternative_uids: user
                .alternative_uids
                .iter()
                .map(|(p, uid)| (p.to_string(), uid.clone()))
                .collect(),
            primary_uid: user.primary_uid.clone(),
        }
    }
}

/// Get the signed-in user's record.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let record = state
        .accounts
        .get_user_by_uid(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.uid)))?;

    Ok(Json(UserResponse::from(&record)))
}

async fn get_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserResponse>>> {
    let users = state.accounts.get_users().await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<UserResponse>> {
    let record = state
        .accounts
        .get_user_by_uid(&uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

    Ok(Json(UserResponse::from(&record)))
}

// ─── Account Linking ─────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LinkResponse {
    pub user: UserResponse,
    /// False when the identity was already linked
    pub linked: bool,
}

/// Link another federated provider to the signed-in user's account.
async fn link_provider(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(req): Json<FederatedRequest>,
) -> Result<Json<LinkResponse>> {
    let provider = parse_federated_provider(&provider)?;
    let env = ClientEnv::from_headers(&headers);

    let resolved = state
        .accounts
        .link_provider(&user.uid, provider, &req.credential, &env)
        .await?;

    Ok(Json(LinkResponse {
        user: UserResponse::from(&resolved.user),
        linked: resolved.merged,
    }))
}

// ─── Audit Log ───────────────────────────────────────────────

/// Audit log query parameters. `all` (or empty) disables a filter.
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub provider: Option<String>,
    /// `true` / `false`
    pub success: Option<String>,
    /// Exact user email
    pub user: Option<String>,
    pub search: Option<String>,
    /// `today`, `week` or `month`; ignored when `start` is given
    pub range: Option<String>,
    /// RFC3339 lower bound (inclusive)
    pub start: Option<String>,
    /// RFC3339 upper bound (inclusive)
    pub end: Option<String>,
    /// Capped at `MAX_AUDIT_LIMIT`
    pub limit: Option<String>,
}

/// Drop unset, empty and `all` values.
fn selected(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "all")
}

fn parse_param<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    selected(value)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| AppError::BadRequest(format!("Invalid '{}' parameter: {}", name, raw)))
        })
        .transpose()
}

fn parse_timestamp(name: &str, value: Option<String>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    selected(value)
        .map(|raw| {
            parse_utc_rfc3339(&raw).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Invalid '{}' parameter: must be RFC3339 datetime",
                    name
                ))
            })
        })
        .transpose()
}

impl AuditLogQuery {
    /// Build store-independent filters relative to `now`.
    pub fn into_filters(self, now: chrono::DateTime<chrono::Utc>) -> Result<AuditFilters> {
        let preset: Option<DateRangePreset> = parse_param("range", self.range)?;
        let start = match parse_timestamp("start", self.start)? {
            Some(start) => Some(start),
            None => preset.map(|p| p.start(now)),
        };

        Ok(AuditFilters {
            action: parse_param::<AuditAction>("action", self.action)?,
            provider: parse_param("provider", self.provider)?,
            success: parse_param("success", self.success)?,
            user_email: selected(self.user),
            search: selected(self.search),
            start,
            end: parse_timestamp("end", self.end)?,
            limit: parse_param::<usize>("limit", self.limit)?.map(|l| l.min(MAX_AUDIT_LIMIT)),
        })
    }
}

async fn get_audit_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditLogQuery>,
) -> Result<Json<Vec<AuditEntry>>> {
    let filters = params.into_filters(chrono::Utc::now())?;
    let entries = state.audit.query(&filters).await?;
    Ok(Json(entries))
}

async fn get_user_audit_logs(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<AuditEntry>>> {
    Ok(Json(state.audit.for_user(&uid).await?))
}

async fn get_audit_stats(State(state): State<Arc<AppState>>) -> Result<Json<AuditStats>> {
    Ok(Json(state.audit.stats().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_all_disables_filters() {
        let query = AuditLogQuery {
            action: Some("all".to_string()),
            provider: Some("all".to_string()),
            success: Some("all".to_string()),
            user: Some(String::new()),
            range: Some("all".to_string()),
            limit: Some("all".to_string()),
            ..Default::default()
        };
        assert_eq!(query.into_filters(Utc::now()).unwrap(), AuditFilters::default());
    }

    #[test]
    fn test_invalid_limit_rejected() {
        let query = AuditLogQuery {
            limit: Some("ten".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            query.into_filters(Utc::now()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_filters_parse() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let query = AuditLogQuery {
            action: Some("account_merge".to_string()),
            provider: Some("github".to_string()),
            success: Some("false".to_string()),
            range: Some("week".to_string()),
            limit: Some("50000".to_string()),
            ..Default::default()
        };
        let filters = query.into_filters(now).unwrap();
        assert_eq!(filters.action, Some(AuditAction::AccountMerge));
        assert_eq!(filters.provider, Some(Provider::Github));
        assert_eq!(filters.success, Some(false));
        assert_eq!(filters.start, Some(Utc.with_ymd_and_hms(2026, 5, 3, 12, 0, 0).unwrap()));
        assert_eq!(filters.limit, Some(MAX_AUDIT_LIMIT));
    }

    #[test]
    fn test_explicit_start_wins_over_range() {
        let query = AuditLogQuery {
            range: Some("today".to_string()),
            start: Some("2026-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        let filters = query.into_filters(Utc::now()).unwrap();
        assert_eq!(filters.start, Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_invalid_params_rejected() {
        for query in [
            AuditLogQuery {
                action: Some("logout".to_string()),
                ..Default::default()
            },
            AuditLogQuery {
                success: Some("maybe".to_string()),
                ..Default::default()
            },
            AuditLogQuery {
                end: Some("tomorrow".to_string()),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                query.into_filters(Utc::now()),
                Err(AppError::BadRequest(_))
            ));
        }
    }
}
