// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process LRU backend.
//!
//! Bounded by entry count; each entry carries its own deadline computed from
//! the injected clock at insertion time.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;

use super::CacheError;
use crate::clock::{expiry_after, Clock};

/// Cached value plus the instant after which it must be treated as absent.
struct CacheEntry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// In-process LRU cache with per-entry TTL.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        if let Some(entry) = entries.get(key) {
            if now < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
            // Expired
            entries.pop(key);
        }
        Ok(None)
    }

    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = expiry_after(self.clock.now(), ttl);
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.put(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    pub fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.pop(key);
        Ok(())
    }
}
