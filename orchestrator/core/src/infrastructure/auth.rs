// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Authentication Collaborator
//!
//! Token acquisition is delegated entirely to this layer; the gateway asks
//! for a bearer credential before each call and refresh-on-expiry happens
//! here, transparently.
//!
//! Whether the engine runs as a service principal or as a delegated user is
//! an explicit [`CredentialMode`] chosen at construction time, never an
//! ambient process toggle.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::EngineError;

/// Refresh this long before the reported expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

// ============================================================================
// Contract
// ============================================================================

/// How the engine authenticates against the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialMode {
    /// Client-credentials exchange with a directory application.
    ServicePrincipal,
    /// A user-supplied delegated token (interactive or pipeline-injected).
    UserDelegated,
}

/// A bearer credential with optional expiry.
#[derive(Debug, Clone)]
pub struct Token {
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() + ChronoDuration::seconds(EXPIRY_SKEW_SECS) >= at,
            None => false,
        }
    }
}

/// Supplies a valid bearer credential on demand.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire_token(&self, scope: &str) -> Result<Token, EngineError>;
}

// ============================================================================
// Static provider (user-delegated / test)
// ============================================================================

/// Wraps an externally acquired token. Used for [`CredentialMode::UserDelegated`]
/// automation where the surrounding pipeline injects the credential.
pub struct StaticTokenProvider {
    token: Token,
}

impl StaticTokenProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            token: Token {
                secret: secret.into(),
                expires_at: None,
            },
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn acquire_token(&self, scope: &str) -> Result<Token, EngineError> {
        if self.token.secret.is_empty() {
            return Err(EngineError::AuthenticationFailed {
                scope: scope.to_string(),
                reason: "empty delegated token".to_string(),
            });
        }
        Ok(self.token.clone())
    }
}

// ============================================================================
// Client-secret provider (service principal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Performs the client-credentials exchange, caching the token until shortly
/// before expiry.
pub struct ClientSecretTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    mode: CredentialMode,
    cached: Mutex<Option<Token>>,
}

impl ClientSecretTokenProvider {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        mode: CredentialMode,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            mode,
            cached: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> CredentialMode {
        self.mode
    }
}

#[async_trait::async_trait]
impl TokenProvider for ClientSecretTokenProvider {
    async fn acquire_token(&self, scope: &str) -> Result<Token, EngineError> {
        if let Some(token) = self.cached.lock().clone() {
            if !token.is_expired() {
                return Ok(token);
            }
        }

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| EngineError::AuthenticationFailed {
                scope: scope.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::AuthenticationFailed {
                scope: scope.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| EngineError::AuthenticationFailed {
                    scope: scope.to_string(),
                    reason: format!("malformed token response: {e}"),
                })?;

        let token = Token {
            secret: parsed.access_token,
            expires_at: parsed
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        };
        *self.cached.lock() = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_its_token() {
        let provider = StaticTokenProvider::new("tkn-abc");
        let token = provider.acquire_token("api://default").await.unwrap();
        assert_eq!(token.secret, "tkn-abc");
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn empty_delegated_token_is_an_authentication_failure() {
        let provider = StaticTokenProvider::new("");
        let err = provider.acquire_token("api://default").await.unwrap_err();
        assert!(matches!(err, EngineError::AuthenticationFailed { .. }));
    }

    #[test]
    fn token_expiry_applies_skew() {
        let token = Token {
            secret: "x".into(),
            expires_at: Some(Utc::now() + ChronoDuration::seconds(30)),
        };
        // 30s remaining is inside the 60s skew window.
        assert!(token.is_expired());

        let fresh = Token {
            secret: "x".into(),
            expires_at: Some(Utc::now() + ChronoDuration::seconds(600)),
        };
        assert!(!fresh.is_expired());
    }

    #[tokio::test]
    async fn client_secret_exchange_and_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok-1","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = ClientSecretTokenProvider::new(
            format!("{}/token", server.url()),
            "app-id",
            "s3cret",
            CredentialMode::ServicePrincipal,
        );

        let first = provider.acquire_token("api://default").await.unwrap();
        let second = provider.acquire_token("api://default").await.unwrap();
        assert_eq!(first.secret, "tok-1");
        // Second call is served from cache.
        assert_eq!(second.secret, "tok-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_exchange_maps_to_authentication_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(401)
            .with_body("invalid_client")
            .create_async()
            .await;

        let provider = ClientSecretTokenProvider::new(
            format!("{}/token", server.url()),
            "app-id",
            "wrong",
            CredentialMode::ServicePrincipal,
        );
        let err = provider.acquire_token("api://default").await.unwrap_err();
        match err {
            EngineError::AuthenticationFailed { reason, .. } => {
                assert!(reason.contains("401"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
