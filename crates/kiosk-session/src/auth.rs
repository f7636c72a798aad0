//! Session token issuance.
//!
//! The avatar vendor hands out short-lived session tokens from an
//! authorization endpoint: `POST` with the account API key as bearer
//! credential and the persona configuration as body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::persona::PersonaConfig;

pub const DEFAULT_AUTH_URL: &str = "https://api.anam.ai/v1/auth/session-token";

/// Short-lived credential for one avatar session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Issues session tokens for a persona.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_token(&self, persona: &PersonaConfig) -> SessionResult<SessionToken>;
}

/// Configuration for the HTTP token issuer.
#[derive(Clone)]
pub struct AuthConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl AuthConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    persona_config: &'a PersonaConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    session_token: String,
}

/// Token issuer backed by the vendor's HTTP endpoint. One attempt per call,
/// no retries.
pub struct HttpTokenIssuer {
    http: Client,
    config: AuthConfig,
}

impl HttpTokenIssuer {
    pub fn new(config: AuthConfig) -> SessionResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SessionError::Auth(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue_token(&self, persona: &PersonaConfig) -> SessionResult<SessionToken> {
        tracing::debug!(endpoint = %self.config.endpoint, persona = %persona.name, "requesting session token");

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&TokenRequest {
                persona_config: persona,
            })
            .send()
            .await
            .map_err(|e| SessionError::Auth(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "session token endpoint refused");
            return Err(SessionError::Auth(format!("session token error: {status}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Auth(format!("malformed token response: {e}")))?;
        if body.session_token.is_empty() {
            return Err(SessionError::Auth("empty session token".into()));
        }
        Ok(SessionToken(body.session_token))
    }
}
