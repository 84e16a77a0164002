// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis backend.
//!
//! A single multiplexed connection is shared by all callers and re-established
//! lazily after any failure. Every round trip is bounded by `op_timeout`.

use std::future::Future;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use super::CacheError;

/// Redis-backed key/value store with server-side TTL.
pub struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    op_timeout: Duration,
}

impl RedisCache {
    /// Create a backend for `url`. No connection is made until first use.
    pub fn new(url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            op_timeout,
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.run(|mut conn| {
            let key = key.to_string();
            async move { conn.get::<_, Option<Vec<u8>>>(key).await }
        })
        .await
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        // PSETEX rejects 0; anything shorter than a millisecond rounds up.
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        self.run(|mut conn| {
            let key = key.to_string();
            async move { conn.pset_ex::<_, _, ()>(key, value, millis).await }
        })
        .await
    }

    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.run(|mut conn| {
            let key = key.to_string();
            async move { conn.del::<_, ()>(key).await }
        })
        .await
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.run(|mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let attempt = async {
            let conn = self.connection().await?;
            op(conn).await.map_err(CacheError::from)
        };

        let result = match tokio::time::timeout(self.op_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        };

        if result.is_err() {
            self.connection.lock().await.take();
        }
        result
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }
}
