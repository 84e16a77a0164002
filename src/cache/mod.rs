// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cache Layer
//!
//! Generic TTL key/value store shared by the session validator and the role
//! resolver.
//!
//! ## Backends
//!
//! - **Memory**: in-process LRU, single instance only
//! - **Redis**: shared across instances, TTL enforced server-side
//!
//! ## Failure Policy
//!
//! Backend errors never reach callers. A failed `get` is reported as a miss
//! and a failed `set`/`invalidate` is logged and dropped, so an unreachable
//! cache only pushes more lookups to the authoritative source.
//!
//! There is no single-flight: concurrent misses for one key may each trigger
//! their own upstream lookup.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::clock::Clock;
use crate::config::{CacheBackendKind, Config};

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

/// Errors raised by a cache backend. Absorbed by [`Cache`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache lock poisoned")]
    Poisoned,

    #[error("cached value could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<::redis::RedisError> for CacheError {
    fn from(e: ::redis::RedisError) -> Self {
        CacheError::Unavailable(e.to_string())
    }
}

/// Storage behind a [`Cache`].
#[derive(Clone)]
pub enum CacheBackend {
    Memory(Arc<MemoryCache>),
    Redis(Arc<RedisCache>),
}

impl CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.get(key),
            CacheBackend::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.set(key, value, ttl),
            CacheBackend::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.invalidate(key),
            CacheBackend::Redis(cache) => cache.invalidate(key).await,
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Memory(_) => "memory",
            CacheBackend::Redis(_) => "redis",
        }
    }
}

/// Fail-open, JSON-encoding front over a [`CacheBackend`].
///
/// Cloning is cheap; all clones share the same storage.
#[derive(Clone)]
pub struct Cache {
    backend: CacheBackend,
}

impl Cache {
    pub fn new(backend: CacheBackend) -> Self {
        Self { backend }
    }

    /// Build the backend selected by `config`. Redis connects lazily, so an
    /// unreachable server at startup is not an error here.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let backend = match config.cache_backend {
            CacheBackendKind::Memory => {
                CacheBackend::Memory(Arc::new(MemoryCache::new(config.cache_capacity, clock)))
            }
            CacheBackendKind::Redis => CacheBackend::Redis(Arc::new(RedisCache::new(
                config.redis_url.as_str(),
                config.upstream_timeout,
            )?)),
        };
        Ok(Self::new(backend))
    }

    /// Look up `key`. Misses, expired entries, backend failures and values
    /// that no longer decode as `T` all come back as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.backend.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, backend = self.mode(), "cache GET failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                tracing::debug!(key = %key, "cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "undecodable cache entry, dropping");
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl`. Best effort.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache value not serializable, skipping");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, bytes, ttl).await {
            tracing::warn!(key = %key, error = %e, backend = self.mode(), "cache SET failed");
        }
    }

    /// Remove `key`. Best effort.
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.backend.invalidate(key).await {
            tracing::warn!(key = %key, error = %e, backend = self.mode(), "cache DEL failed");
        }
    }

    /// Whether the backing store answers right now (for readiness probes).
    pub async fn is_available(&self) -> bool {
        match &self.backend {
            CacheBackend::Memory(_) => true,
            CacheBackend::Redis(cache) => cache.ping().await.is_ok(),
        }
    }

    /// Backend name for logs and health output.
    pub fn mode(&self) -> &'static str {
        self.backend.mode()
    }
}
