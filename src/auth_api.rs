//! Client for the external login API.
//!
//! One form-encoded POST per login attempt. HTTP error statuses and malformed
//! bodies never produce an error; they are folded into a
//! [`CredentialCheckResult`]. Only transport failures (connect, timeout)
//! surface as [`AuthApiError`].

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Transport-level failure talking to the login API
#[derive(Error, Debug)]
pub enum AuthApiError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
}

/// Normalized outcome of one login call
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialCheckResult {
    pub status_code: u16,
    pub success: bool,
    pub username: Option<String>,
    pub raw_payload: Value,
}

impl CredentialCheckResult {
    /// Build a result from an HTTP status and the raw response body.
    ///
    /// A non-JSON (or non-object) body is treated as `{"success": false}`.
    /// A `status_code` carried in the body wins over the HTTP status.
    pub fn from_response(http_status: u16, body: &str) -> Self {
        let mut payload = match serde_json::from_str::<Value>(body) {
            Ok(value @ Value::Object(_)) => value,
            _ => json!({ "success": false }),
        };

        let status_code = payload
            .get("status_code")
            .and_then(parse_status)
            .unwrap_or(http_status);

        if let Some(obj) = payload.as_object_mut() {
            obj.entry("status_code").or_insert(json!(http_status));
        }

        Self {
            status_code,
            success: payload.get("success").map(flag).unwrap_or(false),
            username: pick_username(&payload),
            raw_payload: payload,
        }
    }

    pub fn is_success(&self) -> bool {
        is_success(self)
    }

    /// The API answers wrong credentials with a 500
    pub fn is_bad_credentials(&self) -> bool {
        !self.is_success() && self.status_code == 500
    }
}

/// Only HTTP 200 with a true success flag counts
pub fn is_success(result: &CredentialCheckResult) -> bool {
    result.status_code == 200 && result.success
}

/// Extract `user.username` without trusting the payload shape
pub fn pick_username(payload: &Value) -> Option<String> {
    payload
        .get("user")?
        .get("username")?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_status(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Something that can check a login/password pair
#[async_trait]
pub trait CredentialChecker: Send + Sync {
    async fn login(
        &self,
        login: &str,
        password: &str,
    ) -> Result<CredentialCheckResult, AuthApiError>;
}

/// HTTP client for the login API
#[derive(Clone)]
pub struct AuthApi {
    base_url: String,
    http_client: reqwest::Client,
}

impl AuthApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthApiError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn login_url(&self) -> String {
        format!("{}/?action=login", self.base_url)
    }
}

#[async_trait]
impl CredentialChecker for AuthApi {
    async fn login(
        &self,
        login: &str,
        password: &str,
    ) -> Result<CredentialCheckResult, AuthApiError> {
        let url = self.login_url();
        // Never log the password
        info!("AuthAPI: POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .form(&[("login", login), ("password", password)])
            .send()
            .await?;

        let status = response.status().as_u16();
        debug!("AuthAPI: response status={}", status);

        // A body that cannot be read is treated like a malformed one
        let body = response.text().await.unwrap_or_default();
        let result = CredentialCheckResult::from_response(status, &body);

        info!(
            "AuthAPI: login success={} status={}",
            result.success, result.status_code
        );
        Ok(result)
    }
}
