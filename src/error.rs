// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::StoreError;
use crate::models::Provider;

/// Closed taxonomy of authentication failures surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    DuplicateEmail,
    WeakCredential,
    InvalidEmailFormat,
    UserNotFound,
    WrongCredential,
    AccountDisabled,
    RateLimited,
    SignInCancelled,
    PopupBlocked,
    UnauthorizedOrigin,
    ProviderNotEnabled,
    MissingProviderEmail,
    StoreUnavailable,
    Unknown,
}

impl AuthErrorKind {
    /// Default user-facing message for this kind.
    pub fn message(&self, provider: Provider) -> String {
        match self {
            AuthErrorKind::DuplicateEmail => "This email is already registered".to_string(),
            AuthErrorKind::WeakCredential => "The password is too weak".to_string(),
            AuthErrorKind::InvalidEmailFormat => "Invalid email address".to_string(),
            AuthErrorKind::UserNotFound => "User not found".to_string(),
            AuthErrorKind::WrongCredential => "Incorrect credentials".to_string(),
            AuthErrorKind::AccountDisabled => "This account has been disabled".to_string(),
            AuthErrorKind::RateLimited => "Too many attempts. Try again later".to_string(),
            AuthErrorKind::SignInCancelled => "Sign-in cancelled".to_string(),
            AuthErrorKind::PopupBlocked => {
                "Sign-in popup was blocked by the browser. Allow popups for this site".to_string()
            }
            AuthErrorKind::UnauthorizedOrigin => {
                "This domain is not authorized for sign-in".to_string()
            }
            AuthErrorKind::ProviderNotEnabled => {
                format!("{} sign-in is not enabled", provider.display_name())
            }
            AuthErrorKind::MissingProviderEmail => format!(
                "Your {} account has no public email address",
                provider.display_name()
            ),
            AuthErrorKind::StoreUnavailable => {
                "The account service is temporarily unavailable".to_string()
            }
            AuthErrorKind::Unknown => "Authentication failed".to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthErrorKind::DuplicateEmail => StatusCode::CONFLICT,
            AuthErrorKind::WeakCredential
            | AuthErrorKind::InvalidEmailFormat
            | AuthErrorKind::SignInCancelled
            | AuthErrorKind::PopupBlocked
            | AuthErrorKind::ProviderNotEnabled => StatusCode::BAD_REQUEST,
            AuthErrorKind::UserNotFound | AuthErrorKind::WrongCredential => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::AccountDisabled | AuthErrorKind::UnauthorizedOrigin => {
                StatusCode::FORBIDDEN
            }
            AuthErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthErrorKind::MissingProviderEmail => StatusCode::UNPROCESSABLE_ENTITY,
            AuthErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthErrorKind::Unknown => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Authentication failure: a taxonomy kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error of `kind` with its default message.
    pub fn of(kind: AuthErrorKind, provider: Provider) -> Self {
        Self::new(kind, kind.message(provider))
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::new(AuthErrorKind::StoreUnavailable, e.to_string())
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string(), None),
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "not_found".to_string(), Some(msg.clone()))
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "bad_request".to_string(),
                Some(msg.clone()),
            ),
            AppError::Auth(err) => {
                let code = serde_json::to_value(err.kind)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| "unknown".to_string());
                (err.kind.status(), code, Some(err.message.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse { error, details };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
