// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wall-clock source shared by the cache, the session validator and the
//! report key issuer.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// `from + ttl`, saturating at the largest representable instant.
pub fn expiry_after(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Time left until `deadline`, or `None` once it has passed.
pub fn remaining(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Option<Duration> {
    (deadline - now).to_std().ok().filter(|left| !left.is_zero())
}

/// Real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
