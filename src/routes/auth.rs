// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public authentication routes: register, login, federated sign-in,
//! password reset and logout.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::models::{ClientEnv, Provider};
use crate::routes::api::UserResponse;
use crate::services::{FederatedCredential, ResolvedUser};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/federated/{provider}", post(federated_login))
        .route("/auth/password/reset", post(send_password_reset))
        .route("/auth/password/verify", post(verify_reset_code))
        .route("/auth/password/confirm", post(confirm_reset))
        .route("/auth/logout", post(logout))
}

// ─── Requests ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Credential produced by the client's interactive sign-in.
#[derive(Deserialize)]
pub struct FederatedRequest {
    pub credential: FederatedCredential,
}

#[derive(Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
}

#[derive(Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[validate(length(min = 1))]
    pub code: String,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResetRequest {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1, max = 128))]
    pub new_password: String,
}

// ─── Responses ───────────────────────────────────────────────

/// Successful sign-in: session token plus the canonical user.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
    /// This sign-in linked a new provider to an existing account
    pub merged: bool,
    /// This sign-in created the account
    pub is_new: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VerifyCodeResponse {
    pub email: String,
}

// ─── Handlers ────────────────────────────────────────────────

async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    req.validate()?;
    let env = ClientEnv::from_headers(&headers);

    let resolved = state
        .accounts
        .register(req.name.trim(), &req.email, &req.password, &env)
        .await?;

    start_session(&state, jar, resolved)
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    req.validate()?;
    let env = ClientEnv::from_headers(&headers);

    let resolved = state
        .accounts
        .login(&req.email, &req.password, &env)
        .await?;

    start_session(&state, jar, resolved)
}

async fn federated_login(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<FederatedRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let provider = parse_federated_provider(&provider)?;
    let env = ClientEnv::from_headers(&headers);

    let resolved = state
        .accounts
        .login_with_provider(provider, &req.credential, &env)
        .await?;

    start_session(&state, jar, resolved)
}

async fn send_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;
    state.accounts.send_password_reset(&req.email).await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Password reset email sent".to_string(),
    }))
}

async fn verify_reset_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>> {
    req.validate()?;
    let email = state.accounts.verify_password_reset_code(&req.code).await?;
    Ok(Json(VerifyCodeResponse { email }))
}

async fn confirm_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmResetRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;
    state
        .accounts
        .confirm_password_reset(&req.code, &req.new_password)
        .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Password updated".to_string(),
    }))
}

/// Clear the session cookie. Bearer-token clients just drop the token.
async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        jar,
        Json(MessageResponse {
            success: true,
            message: "Signed out".to_string(),
        }),
    )
}

// ─── Helpers ─────────────────────────────────────────────────

/// Parse a `{provider}` path segment that must name a federated provider.
pub(crate) fn parse_federated_provider(raw: &str) -> Result<Provider> {
    let provider: Provider = raw
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown provider: {}", raw)))?;
    if !provider.is_federated() {
        return Err(AppError::BadRequest(format!(
            "{} is not a federated provider",
            provider
        )));
    }
    Ok(provider)
}

/// Issue a session token for the resolved user (JSON body and cookie).
fn start_session(
    state: &AppState,
    jar: CookieJar,
    resolved: ResolvedUser,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let token = create_jwt(&resolved.user.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let secure = !state.config.frontend_url.starts_with("http://");
    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build();

    tracing::info!(
        uid = %resolved.user.id,
        merged = resolved.merged,
        is_new = resolved.created,
        audit_recorded = resolved.audit.is_recorded(),
        "Session started"
    );

    Ok((
        jar.add(cookie),
        Json(AuthResponse {
            token,
            user: UserResponse::from(&resolved.user),
            merged: resolved.merged,
            is_new: resolved.created,
        }),
    ))
}
