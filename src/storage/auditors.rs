// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provisioned auditor list.
//!
//! Loaded once at startup from a JSON array:
//!
//! ```json
//! [
//!   { "username": "Alice", "granted_at": "2026-01-01T00:00:00Z" },
//!   { "username": "bob" }
//! ]
//! ```
//!
//! Usernames are stored and looked up in normalized form, so `"Alice"`,
//! `" alice "` and the full-width `"ａｌｉｃｅ"` are the same auditor.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use unicode_normalization::UnicodeNormalization;

use super::{StorageError, StorageResult};

/// A user granted the auditor role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorRecord {
    pub username: String,
    #[serde(default = "chrono::Utc::now")]
    pub granted_at: DateTime<Utc>,
}

/// Canonical form used for auditor membership: NFKC, trimmed, lowercase.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

/// Authoritative auditor membership.
#[async_trait]
pub trait AuditorDirectory: Send + Sync + 'static {
    /// Whether `username` is a provisioned auditor.
    async fn contains(&self, username: &str) -> StorageResult<bool>;

    /// All provisioned auditors.
    async fn list(&self) -> StorageResult<Vec<AuditorRecord>>;
}

/// Auditor list held in memory, keyed by normalized username.
#[derive(Default)]
pub struct InMemoryAuditorDirectory {
    records: RwLock<HashMap<String, AuditorRecord>>,
}

impl InMemoryAuditorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = AuditorRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (normalize_username(&record.username), record))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load the provisioning file at `path`.
    pub async fn load_json(path: &Path) -> StorageResult<Self> {
        let content = tokio::fs::read(path).await?;
        let records: Vec<AuditorRecord> = serde_json::from_slice(&content)?;
        Ok(Self::from_records(records))
    }

    /// Like [`load_json`](Self::load_json), but a missing file yields an empty
    /// directory (with a warning). Unreadable or malformed files still fail.
    pub async fn load_or_empty(path: &Path) -> StorageResult<Self> {
        match Self::load_json(path).await {
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(
                    path = %path.display(),
                    "auditor provisioning file not found, no user will resolve as auditor"
                );
                Ok(Self::new())
            }
            other => other,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl AuditorDirectory for InMemoryAuditorDirectory {
    async fn contains(&self, username: &str) -> StorageResult<bool> {
        let key = normalize_username(username);
        Ok(self.records.read().await.contains_key(&key))
    }

    async fn list(&self) -> StorageResult<Vec<AuditorRecord>> {
        let mut records: Vec<AuditorRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(records)
    }
}
