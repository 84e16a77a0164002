// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session validation with a cache in front of the identity provider.
//!
//! ## Flow
//!
//! 1. Look the identifier up under the `session:` namespace
//! 2. A cached session whose expiry has not passed is returned as is; an
//!    expired one is purged and treated as a miss
//! 3. On a miss the identity provider is asked; a verified session is cached
//!    for the rest of its trust window, failures are never cached
//!
//! The provider call runs on its own task. A caller that times out or is
//! cancelled stops waiting, but the call still completes and populates the
//! cache for the next request.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::AuthError;
use super::provider::IdentityProvider;
use crate::cache::Cache;
use crate::clock::{expiry_after, remaining, Clock};

/// Default trust window for a verified session (5 minutes).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(300);

/// Default bound on a single identity provider call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

const SESSION_KEY_PREFIX: &str = "session:";

/// A session verified by the identity provider. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque identifier presented by the caller
    pub id: String,
    /// Username owning the session
    pub username: String,
    /// When the identity provider confirmed the session
    pub verified_at: DateTime<Utc>,
    /// End of the trust window
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Cached form of a [`Session`]. Holds a digest of the identifier instead of
/// the identifier itself.
#[derive(Debug, Serialize, Deserialize)]
struct CachedSession {
    fingerprint: String,
    username: String,
    verified_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CachedSession {
    fn from_session(session: &Session) -> Self {
        Self {
            fingerprint: fingerprint(&session.id),
            username: session.username.clone(),
            verified_at: session.verified_at,
            expires_at: session.expires_at,
        }
    }

    fn into_session(self, identifier: &str) -> Option<Session> {
        (self.fingerprint == fingerprint(identifier)).then(|| Session {
            id: identifier.to_string(),
            username: self.username,
            verified_at: self.verified_at,
            expires_at: self.expires_at,
        })
    }
}

/// Resolves session identifiers to verified sessions.
pub struct SessionValidator {
    cache: Cache,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    upstream_timeout: Duration,
}

impl SessionValidator {
    pub fn new(cache: Cache, provider: Arc<dyn IdentityProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            provider,
            clock,
            session_ttl: DEFAULT_SESSION_TTL,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Upper bound on how long a verified session is trusted without asking
    /// the provider again. Also the TTL when the provider gives no expiry.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Validate `identifier`, from cache when possible.
    pub async fn validate(&self, identifier: &str) -> Result<Session, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AuthError::MissingSession);
        }

        let key = session_cache_key(identifier);
        if let Some(cached) = self.cache.get::<CachedSession>(&key).await {
            match cached.into_session(identifier) {
                Some(session) if session.is_valid_at(self.clock.now()) => return Ok(session),
                _ => self.cache.invalidate(&key).await,
            }
        }

        self.verify_upstream(identifier, key).await
    }

    /// Drop any cached verification for `identifier`.
    pub async fn forget(&self, identifier: &str) {
        self.cache.invalidate(&session_cache_key(identifier.trim())).await;
    }

    async fn verify_upstream(&self, identifier: &str, key: String) -> Result<Session, AuthError> {
        let lookup = UpstreamLookup {
            cache: self.cache.clone(),
            provider: self.provider.clone(),
            clock: self.clock.clone(),
            session_ttl: self.session_ttl,
            identifier: identifier.to_string(),
            key,
        };

        let task = tokio::spawn(lookup.run());
        match tokio::time::timeout(self.upstream_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(AuthError::IdentityProviderUnavailable(format!(
                "verification task failed: {e}"
            ))),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.upstream_timeout.as_millis() as u64,
                    "identity provider did not answer in time"
                );
                Err(AuthError::IdentityProviderUnavailable(format!(
                    "no answer within {:?}",
                    self.upstream_timeout
                )))
            }
        }
    }
}

/// Everything one provider round trip needs, owned so it can outlive the
/// request that started it.
struct UpstreamLookup {
    cache: Cache,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    identifier: String,
    key: String,
}

impl UpstreamLookup {
    async fn run(self) -> Result<Session, AuthError> {
        let identity = self
            .provider
            .verify_session(&self.identifier)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "identity provider refused session");
                AuthError::from(e)
            })?;

        let now = self.clock.now();
        let trust_until = expiry_after(now, self.session_ttl);
        let expires_at = identity
            .valid_until
            .map_or(trust_until, |valid_until| valid_until.min(trust_until));
        let ttl = remaining(now, expires_at).ok_or(AuthError::SessionExpired)?;

        let session = Session {
            id: self.identifier,
            username: identity.username,
            verified_at: now,
            expires_at,
        };
        self.cache
            .set(&self.key, &CachedSession::from_session(&session), ttl)
            .await;

        tracing::debug!(
            username = %session.username,
            ttl_secs = ttl.as_secs(),
            "session verified upstream"
        );
        Ok(session)
    }
}

/// Hex SHA-256 of a session identifier.
fn fingerprint(identifier: &str) -> String {
    format!("{:x}", Sha256::digest(identifier.as_bytes()))
}

/// Cache key for a session identifier. Neither the key nor the cached value
/// carries the raw identifier.
fn session_cache_key(identifier: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{}", fingerprint(identifier))
}
