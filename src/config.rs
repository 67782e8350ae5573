//! Application configuration loaded from environment variables.

use std::env;

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local store, contents lost on restart
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase Web API key for the Identity Toolkit REST API
    pub firebase_api_key: String,
    /// Frontend URL (CORS origin)
    pub frontend_url: String,
    /// Redirect URI registered for federated sign-in
    pub oauth_request_uri: String,
    /// GCP project ID
    pub gcp_project_id: String,
    pub store_backend: StoreBackend,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            oauth_request_uri: env::var("OAUTH_REQUEST_URI")
                .unwrap_or_else(|_| frontend_url.clone()),
            frontend_url,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            store_backend: parse_backend(env::var("STORE_BACKEND").ok().as_deref())?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            firebase_api_key: "test_api_key".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            oauth_request_uri: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            store_backend: StoreBackend::Memory,
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

fn parse_backend(value: Option<&str>) -> Result<StoreBackend, ConfigError> {
    match value.map(str::trim) {
        None | Some("") | Some("firestore") => Ok(StoreBackend::Firestore),
        Some("memory") => Ok(StoreBackend::Memory),
        Some(other) => Err(ConfigError::Invalid {
            name: "STORE_BACKEND",
            value: other.to_string(),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
