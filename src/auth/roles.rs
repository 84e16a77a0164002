// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role resolution for verified sessions.
//!
//! ## Role Hierarchy
//!
//! - `Anonymous` - no verified identity, or a verified user without a grant
//! - `Auditor` - provisioned moderator, may reach protected moderation routes
//!
//! Membership answers are cached per normalized username under the
//! `auditor:` namespace, with a TTL independent of the session TTL.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::session::Session;
use crate::cache::Cache;
use crate::storage::{normalize_username, AuditorDirectory};

/// Default TTL for a cached auditor-membership answer (1 hour).
pub const DEFAULT_ROLE_TTL: Duration = Duration::from_secs(3600);

const ROLE_KEY_PREFIX: &str = "auditor:";

/// Caller role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unauthenticated or unprivileged caller
    Anonymous,
    /// Provisioned moderator
    Auditor,
}

impl Role {
    pub fn is_auditor(&self) -> bool {
        matches!(self, Role::Auditor)
    }
}

impl Default for Role {
    /// Least privilege.
    fn default() -> Self {
        Role::Anonymous
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Anonymous => write!(f, "anonymous"),
            Role::Auditor => write!(f, "auditor"),
        }
    }
}

/// Maps a session to a [`Role`] through the auditor directory.
pub struct RoleResolver {
    cache: Cache,
    directory: Arc<dyn AuditorDirectory>,
    ttl: Duration,
}

impl RoleResolver {
    pub fn new(cache: Cache, directory: Arc<dyn AuditorDirectory>) -> Self {
        Self {
            cache,
            directory,
            ttl: DEFAULT_ROLE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Resolve the role for `session`. No session means `Anonymous` without
    /// touching the directory.
    ///
    /// A directory failure resolves to `Anonymous` and is not cached.
    pub async fn resolve(&self, session: Option<&Session>) -> Role {
        let Some(session) = session else {
            return Role::Anonymous;
        };

        let username = normalize_username(&session.username);
        if username.is_empty() {
            return Role::Anonymous;
        }

        let key = format!("{ROLE_KEY_PREFIX}{username}");
        if let Some(is_auditor) = self.cache.get::<bool>(&key).await {
            return role_for(is_auditor);
        }

        match self.directory.contains(&username).await {
            Ok(is_auditor) => {
                self.cache.set(&key, &is_auditor, self.ttl).await;
                role_for(is_auditor)
            }
            Err(e) => {
                tracing::warn!(
                    username = %username,
                    error = %e,
                    "auditor directory lookup failed, resolving as anonymous"
                );
                Role::Anonymous
            }
        }
    }

    /// Drop the cached membership answer for `username`.
    pub async fn forget(&self, username: &str) {
        let key = format!("{ROLE_KEY_PREFIX}{}", normalize_username(username));
        self.cache.invalidate(&key).await;
    }
}

fn role_for(is_auditor: bool) -> Role {
    if is_auditor {
        Role::Auditor
    } else {
        Role::Anonymous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::cache::{CacheBackend, MemoryCache};
    use crate::clock::{Clock, ManualClock};
    use crate::storage::{
        AuditorRecord, InMemoryAuditorDirectory, StorageError, StorageResult,
    };

    /// Wraps the in-memory directory with a call counter and a failure switch.
    struct CountingDirectory {
        inner: InMemoryAuditorDirectory,
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl AuditorDirectory for CountingDirectory {
        async fn contains(&self, username: &str) -> StorageResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::NotFound("directory offline".to_string()));
            }
            self.inner.contains(username).await
        }

        async fn list(&self) -> StorageResult<Vec<AuditorRecord>> {
            self.inner.list().await
        }
    }

    struct Fixture {
        resolver: RoleResolver,
        directory: Arc<CountingDirectory>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let cache = Cache::new(CacheBackend::Memory(Arc::new(MemoryCache::new(
            64,
            clock.clone(),
        ))));
        let directory = Arc::new(CountingDirectory {
            inner: InMemoryAuditorDirectory::from_records([AuditorRecord {
                username: "alice".to_string(),
                granted_at: Utc::now(),
            }]),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        });
        let resolver = RoleResolver::new(cache, directory.clone()).with_ttl(Duration::from_secs(60));
        Fixture {
            resolver,
            directory,
            clock,
        }
    }

    fn session(username: &str, clock: &ManualClock) -> Session {
        let now = clock.now();
        Session {
            id: "sid".to_string(),
            username: username.to_string(),
            verified_at: now,
            expires_at: now + chrono::Duration::seconds(300),
        }
    }

    #[tokio::test]
    async fn provisioned_user_is_auditor_and_others_anonymous() {
        let f = fixture();
        assert_eq!(f.resolver.resolve(Some(&session("alice", &f.clock))).await, Role::Auditor);
        assert_eq!(f.resolver.resolve(Some(&session("bob", &f.clock))).await, Role::Anonymous);
    }

    #[tokio::test]
    async fn no_session_never_consults_directory() {
        let f = fixture();
        assert_eq!(f.resolver.resolve(None).await, Role::Anonymous);
        assert_eq!(f.directory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn membership_is_cached_per_normalized_username() {
        let f = fixture();
        assert_eq!(f.resolver.resolve(Some(&session("alice", &f.clock))).await, Role::Auditor);
        assert_eq!(f.resolver.resolve(Some(&session(" ALICE", &f.clock))).await, Role::Auditor);
        assert_eq!(f.directory.calls.load(Ordering::SeqCst), 1);

        // Negative answers are cached too.
        f.resolver.resolve(Some(&session("bob", &f.clock))).await;
        f.resolver.resolve(Some(&session("bob", &f.clock))).await;
        assert_eq!(f.directory.calls.load(Ordering::SeqCst), 2);

        f.clock.advance(Duration::from_secs(61));
        f.resolver.resolve(Some(&session("alice", &f.clock))).await;
        assert_eq!(f.directory.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn directory_failure_is_anonymous_and_not_cached() {
        let f = fixture();
        f.directory.failing.store(true, Ordering::SeqCst);
        assert_eq!(f.resolver.resolve(Some(&session("alice", &f.clock))).await, Role::Anonymous);

        f.directory.failing.store(false, Ordering::SeqCst);
        assert_eq!(f.resolver.resolve(Some(&session("alice", &f.clock))).await, Role::Auditor);
    }

    #[tokio::test]
    async fn forget_drops_cached_answer() {
        let f = fixture();
        f.resolver.resolve(Some(&session("alice", &f.clock))).await;
        f.resolver.forget("Alice").await;
        f.resolver.resolve(Some(&session("alice", &f.clock))).await;
        assert_eq!(f.directory.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Auditor).unwrap(), r#""auditor""#);
        assert_eq!(Role::default(), Role::Anonymous);
        assert_eq!(Role::Anonymous.to_string(), "anonymous");
    }
}
