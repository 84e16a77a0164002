// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External identity provider client.
//!
//! The provider exchanges an opaque session identifier for the owning
//! username and, optionally, the instant the session stops being valid.
//!
//! ## Wire Format
//!
//! `GET {base}/api/session?sid=<identifier>`
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 200 | `{ "username": "...", "valid_until": "<RFC 3339>" \| null }` |
//! | 401, 403, 404 | identifier rejected |
//! | 410 | session expired |
//! | anything else | provider unavailable |
//!
//! No retries: a failed call surfaces immediately.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::error::AuthError;

/// Identity returned by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifiedIdentity {
    pub username: String,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

/// Identity provider failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("session rejected by identity provider: {0}")]
    Rejected(String),

    #[error("session expired according to identity provider")]
    Expired,

    #[error("identity provider unreachable: {0}")]
    Unavailable(String),

    #[error("identity provider answered with an unusable body: {0}")]
    Malformed(String),
}

impl From<ProviderError> for AuthError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Rejected(_) => AuthError::InvalidSession,
            ProviderError::Expired => AuthError::SessionExpired,
            ProviderError::Unavailable(msg) | ProviderError::Malformed(msg) => {
                AuthError::IdentityProviderUnavailable(msg)
            }
        }
    }
}

/// Verifies session identifiers.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn verify_session(&self, identifier: &str) -> Result<VerifiedIdentity, ProviderError>;
}

/// HTTP client for the identity provider.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpIdentityProvider {
    /// Create a client for the provider at `base_url`. `timeout` bounds each
    /// call end to end.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, ProviderError> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("api/session")
            .map_err(|e| ProviderError::Malformed(format!("bad provider base URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("HTTP client setup failed: {e}")))?;

        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_session(&self, identifier: &str) -> Result<VerifiedIdentity, ProviderError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("sid", identifier);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let identity: VerifiedIdentity = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Malformed(e.to_string()))?;
                if identity.username.trim().is_empty() {
                    return Err(ProviderError::Malformed("empty username".to_string()));
                }
                Ok(identity)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(ProviderError::Rejected(format!("HTTP {}", response.status())))
            }
            StatusCode::GONE => Err(ProviderError::Expired),
            status => Err(ProviderError::Unavailable(format!(
                "HTTP {status} from identity provider"
            ))),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_built_under_base_path() {
        let base = Url::parse("http://localhost:9000").unwrap();
        let provider = HttpIdentityProvider::new(&base, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.endpoint.as_str(), "http://localhost:9000/api/session");

        let nested = Url::parse("https://idp.example.com/v2").unwrap();
        let provider = HttpIdentityProvider::new(&nested, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.endpoint.as_str(), "https://idp.example.com/v2/api/session");
    }

    #[test]
    fn provider_errors_map_onto_auth_errors() {
        assert_eq!(
            AuthError::from(ProviderError::Rejected("nope".into())),
            AuthError::InvalidSession
        );
        assert_eq!(AuthError::from(ProviderError::Expired), AuthError::SessionExpired);
        assert!(matches!(
            AuthError::from(ProviderError::Unavailable("down".into())),
            AuthError::IdentityProviderUnavailable(_)
        ));
    }

    #[test]
    fn identity_without_expiry_deserializes() {
        let identity: VerifiedIdentity = serde_json::from_str(r#"{"username":"alice"}"#).unwrap();
        assert_eq!(identity.username, "alice");
        assert!(identity.valid_until.is_none());
    }

    #[tokio::test]
    async fn unreachable_provider_is_unavailable() {
        let base = Url::parse("http://127.0.0.1:1").unwrap();
        let provider = HttpIdentityProvider::new(&base, Duration::from_millis(500)).unwrap();

        let result = provider.verify_session("abc").await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
}
