// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-report access keys.
//!
//! A key is 256 bits from the system CSPRNG, handed out base64url encoded.
//! Only an HMAC-SHA256 tag of `(report id, key)` is retained, under a secret
//! drawn once per process, so a key can only ever verify for the report it
//! was minted for and comparison happens in constant time.
//!
//! At most one key is live per report: issuing again replaces the old one.
//! Expired keys are dropped the next time someone presents them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

use crate::clock::{expiry_after, Clock};

/// Default report key lifetime (7 days).
pub const DEFAULT_REPORT_KEY_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

const KEY_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// A freshly issued key. The plain key is never stored server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAccessKey {
    pub report_id: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a key did not verify. Callers outside this module collapse every
/// variant into a single "forbidden" answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportKeyError {
    #[error("no key has been issued for report {0}")]
    UnknownReport(String),

    #[error("report key expired")]
    Expired,

    #[error("report key does not match")]
    Mismatch,

    #[error("system random source failed")]
    Entropy,

    #[error("report key table lock poisoned")]
    Poisoned,
}

struct IssuedKey {
    tag: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// Mints and checks report access keys.
pub struct ReportKeyIssuer {
    secret: [u8; KEY_BYTES],
    keys: RwLock<HashMap<String, IssuedKey>>,
    rng: SystemRandom,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ReportKeyIssuer {
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self, ReportKeyError> {
        let rng = SystemRandom::new();
        let mut secret = [0u8; KEY_BYTES];
        rng.fill(&mut secret).map_err(|_| ReportKeyError::Entropy)?;

        Ok(Self {
            secret,
            keys: RwLock::new(HashMap::new()),
            rng,
            clock,
            ttl: DEFAULT_REPORT_KEY_TTL,
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a key for `report_id`, replacing any previous one.
    pub fn issue(&self, report_id: &str) -> Result<ReportAccessKey, ReportKeyError> {
        let mut raw = [0u8; KEY_BYTES];
        self.rng.fill(&mut raw).map_err(|_| ReportKeyError::Entropy)?;
        let key = Base64UrlUnpadded::encode_string(&raw);

        let expires_at = expiry_after(self.clock.now(), self.ttl);
        let tag = self.tag(report_id, &key)?.finalize().into_bytes().to_vec();

        let mut keys = self.keys.write().map_err(|_| ReportKeyError::Poisoned)?;
        keys.insert(report_id.to_string(), IssuedKey { tag, expires_at });

        tracing::debug!(report_id, expires_at = %expires_at, "report key issued");
        Ok(ReportAccessKey {
            report_id: report_id.to_string(),
            key,
            expires_at,
        })
    }

    /// Check `key` against the key issued for `report_id`.
    pub fn check(&self, report_id: &str, key: &str) -> Result<(), ReportKeyError> {
        let now = self.clock.now();
        {
            let keys = self.keys.read().map_err(|_| ReportKeyError::Poisoned)?;
            let issued = keys
                .get(report_id)
                .ok_or_else(|| ReportKeyError::UnknownReport(report_id.to_string()))?;
            if now < issued.expires_at {
                return self
                    .tag(report_id, key)?
                    .verify_slice(&issued.tag)
                    .map_err(|_| ReportKeyError::Mismatch);
            }
        }

        // Lazy purge; re-check under the write lock in case it was reissued.
        let mut keys = self.keys.write().map_err(|_| ReportKeyError::Poisoned)?;
        if keys
            .get(report_id)
            .is_some_and(|issued| now >= issued.expires_at)
        {
            keys.remove(report_id);
            tracing::debug!(report_id, "expired report key purged");
        }
        Err(ReportKeyError::Expired)
    }

    /// `true` iff `key` is the live key for `report_id`.
    pub fn verify(&self, report_id: &str, key: &str) -> bool {
        match self.check(report_id, key) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(report_id, reason = %e, "report key rejected");
                false
            }
        }
    }

    fn tag(&self, report_id: &str, key: &str) -> Result<HmacSha256, ReportKeyError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| ReportKeyError::Entropy)?;
        mac.update(report_id.as_bytes());
        mac.update(&[0]);
        mac.update(key.as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn issuer() -> (ReportKeyIssuer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let issuer = ReportKeyIssuer::new(clock.clone())
            .unwrap()
            .with_ttl(Duration::from_secs(60));
        (issuer, clock)
    }

    #[test]
    fn issued_key_verifies_for_its_report_only() {
        let (issuer, _) = issuer();
        let a = issuer.issue("42").unwrap();
        let b = issuer.issue("43").unwrap();

        assert!(issuer.verify("42", &a.key));
        assert!(!issuer.verify("42", "wrong"));
        assert!(!issuer.verify("42", &b.key));
        assert!(!issuer.verify("43", &a.key));
        assert_eq!(issuer.check("42", "wrong"), Err(ReportKeyError::Mismatch));
    }

    #[test]
    fn keys_are_high_entropy_and_url_safe() {
        let (issuer, _) = issuer();
        let a = issuer.issue("1").unwrap();
        let b = issuer.issue("2").unwrap();
        assert_ne!(a.key, b.key);
        assert_eq!(a.key.len(), 43);
        assert!(a
            .key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn reissue_invalidates_previous_key() {
        let (issuer, _) = issuer();
        let old = issuer.issue("42").unwrap();
        let new = issuer.issue("42").unwrap();

        assert!(!issuer.verify("42", &old.key));
        assert!(issuer.verify("42", &new.key));
        assert_eq!(issuer.keys.read().unwrap().len(), 1);
    }

    #[test]
    fn unknown_report_is_distinguished_internally() {
        let (issuer, _) = issuer();
        assert_eq!(
            issuer.check("404", "anything"),
            Err(ReportKeyError::UnknownReport("404".to_string()))
        );
    }

    #[test]
    fn expired_key_fails_and_is_purged() {
        let (issuer, clock) = issuer();
        let key = issuer.issue("42").unwrap();

        clock.advance(Duration::from_secs(59));
        assert!(issuer.verify("42", &key.key));

        clock.advance(Duration::from_secs(1));
        assert_eq!(issuer.check("42", &key.key), Err(ReportKeyError::Expired));
        assert!(issuer.keys.read().unwrap().is_empty());
        assert!(matches!(
            issuer.check("42", &key.key),
            Err(ReportKeyError::UnknownReport(_))
        ));
    }
}
