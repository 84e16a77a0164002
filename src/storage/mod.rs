// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Collaborators
//!
//! The gate only consumes persistence through two narrow surfaces:
//!
//! - [`AuditorDirectory`]: the provisioned auditor list, loaded once at
//!   startup and queried by username at runtime
//! - [`ModerationStore`]: reviews and reports, consulted by handlers after a
//!   request has passed the gate
//!
//! Both are in-memory here.

pub mod auditors;
pub mod moderation;

use std::io;

pub use auditors::{normalize_username, AuditorDirectory, AuditorRecord, InMemoryAuditorDirectory};
pub use moderation::ModerationStore;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error while reading a provisioning file
    #[error("I/O error: {0}")]
    Io(io::Error),
    /// JSON deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
