// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication client (Identity Toolkit REST API).
//!
//! Handles:
//! - Email/password sign-up and sign-in
//! - Federated sign-in from a client-obtained OAuth credential
//! - Password reset (send email, verify code, confirm)

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::Provider;
use crate::services::auth_provider::{
    AuthProvider, FederatedCredential, FederatedIdentity, PasswordAccount, ProviderError,
};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const NETWORK_ERROR: &str = "auth/network-request-failed";

/// Identity Toolkit REST client.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Redirect URI registered for federated sign-in
    request_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    #[serde(default)]
    email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdpResponse {
    #[serde(default)]
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    /// Set instead of an HTTP error for some linking conflicts
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest<'a> {
    oob_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_password: Option<&'a str>,
}

#[derive(Deserialize)]
struct ResetPasswordResponse {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl FirebaseAuthClient {
    pub fn new(api_key: String, request_uri: String) -> Self {
        Self::with_base_url(api_key, request_uri, DEFAULT_BASE_URL.to_string())
    }

    /// Client against a custom endpoint (emulator or test server).
    pub fn with_base_url(api_key: String, request_uri: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            request_uri,
        }
    }

    /// POST a JSON body to `accounts:{method}` and parse the response.
    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/accounts:{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::new(NETWORK_ERROR, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(method, %status, "Identity Toolkit request rejected");
            return Err(parse_error_body(&body, status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::new("auth/internal-error", e.to_string()))
    }
}

/// Split `"WEAK_PASSWORD : Password should be at least 6 characters"` into
/// code and message.
fn parse_error_body(body: &str, status: u16) -> ProviderError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return ProviderError::new("auth/internal-error", format!("HTTP {}: {}", status, body));
    };

    let raw = envelope.error.message;
    match raw.split_once(" : ") {
        Some((code, detail)) => ProviderError::new(code.trim(), detail.trim()),
        None => ProviderError::new(raw.trim(), raw.trim()),
    }
}

/// Form-encoded `postBody` for `accounts:signInWithIdp`.
fn idp_post_body(provider: Provider, credential: &FederatedCredential) -> Option<String> {
    let (param, token) = match credential {
        FederatedCredential::IdToken(token) => ("id_token", token),
        FederatedCredential::AccessToken(token) => ("access_token", token),
        FederatedCredential::ClientError(_) => return None,
    };
    Some(format!(
        "{}={}&providerId={}",
        param,
        urlencoding::encode(token),
        provider.firebase_id()
    ))
}

#[async_trait::async_trait]
impl AuthProvider for FirebaseAuthClient {
    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<PasswordAccount, ProviderError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let resp: PasswordResponse = self.call("signUp", &body).await?;
        Ok(PasswordAccount {
            uid: resp.local_id,
            email: if resp.email.is_empty() {
                email.to_string()
            } else {
                resp.email
            },
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<PasswordAccount, ProviderError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let resp: PasswordResponse = self.call("signInWithPassword", &body).await?;
        Ok(PasswordAccount {
            uid: resp.local_id,
            email: resp.email,
        })
    }

    async fn sign_in_with_federated(
        &self,
        provider: Provider,
        credential: &FederatedCredential,
    ) -> Result<FederatedIdentity, ProviderError> {
        if let FederatedCredential::ClientError(code) = credential {
            return Err(ProviderError::new(code.clone(), String::new()));
        }

        let post_body = idp_post_body(provider, credential).ok_or_else(|| {
            ProviderError::new("auth/argument-error", "missing federated credential")
        })?;

        let body = IdpRequest {
            post_body,
            request_uri: &self.request_uri,
            return_secure_token: true,
            return_idp_credential: true,
        };
        let resp: IdpResponse = self.call("signInWithIdp", &body).await?;

        if let Some(code) = resp.error_message {
            return Err(ProviderError::new(code.clone(), code));
        }

        Ok(FederatedIdentity {
            uid: resp.local_id,
            email: resp.email.unwrap_or_default(),
            display_name: resp.display_name,
            photo_url: resp.photo_url,
        })
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), ProviderError> {
        let body = OobRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let _: serde_json::Value = self.call("sendOobCode", &body).await?;
        Ok(())
    }

    async fn verify_password_reset_code(&self, code: &str) -> Result<String, ProviderError> {
        let body = ResetPasswordRequest {
            oob_code: code,
            new_password: None,
        };
        let resp: ResetPasswordResponse = self.call("resetPassword", &body).await?;
        Ok(resp.email)
    }

    async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError> {
        let body = ResetPasswordRequest {
            oob_code: code,
            new_password: Some(new_password),
        };
        let _: ResetPasswordResponse = self.call("resetPassword", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorKind;

    #[test]
    fn test_parse_error_body_with_detail() {
        let body = r#"{"error":{"code":400,"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
        let err = parse_error_body(body, 400);
        assert_eq!(err.code, "WEAK_PASSWORD");
        assert_eq!(err.message, "Password should be at least 6 characters");
        assert_eq!(err.kind(), AuthErrorKind::WeakCredential);
    }

    #[test]
    fn test_parse_error_body_plain_code() {
        let err = parse_error_body(r#"{"error":{"code":400,"message":"EMAIL_EXISTS"}}"#, 400);
        assert_eq!(err.code, "EMAIL_EXISTS");
        assert_eq!(err.kind(), AuthErrorKind::DuplicateEmail);
    }

    #[test]
    fn test_parse_error_body_not_json() {
        let err = parse_error_body("<html>bad gateway</html>", 502);
        assert_eq!(err.kind(), AuthErrorKind::Unknown);
        assert!(err.message.contains("502"));
    }

    #[test]
    fn test_idp_post_body() {
        let body = idp_post_body(
            Provider::Google,
            &FederatedCredential::IdToken("a.b+c".to_string()),
        )
        .unwrap();
        assert_eq!(body, "id_token=a.b%2Bc&providerId=google.com");

        let body = idp_post_body(
            Provider::Github,
            &FederatedCredential::AccessToken("gho_x".to_string()),
        )
        .unwrap();
        assert_eq!(body, "access_token=gho_x&providerId=github.com");

        assert!(idp_post_body(
            Provider::Facebook,
            &FederatedCredential::ClientError("auth/popup-blocked".to_string())
        )
        .is_none());
    }
}
