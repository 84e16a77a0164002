// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment at startup (a `.env` file is
//! loaded first when present).
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `1323` |
//! | `API_HOST` | Externally advertised base URL | `http://localhost:{PORT}` |
//! | `IDENTITY_PROVIDER_URL` | Identity provider base URL | `http://localhost:9000` |
//! | `CACHE_BACKEND` | `redis` or `memory` | `redis` |
//! | `REDIS_URL` | Redis address | `redis://127.0.0.1:6379` |
//! | `CACHE_CAPACITY` | Entry bound of the in-process cache | `10000` |
//! | `SESSION_TTL_SECS` | Trust window of a verified session | `300` |
//! | `ROLE_TTL_SECS` | TTL of a cached auditor-membership answer | `3600` |
//! | `REPORT_KEY_TTL_SECS` | Lifetime of a report access key | `604800` |
//! | `UPSTREAM_TIMEOUT_MS` | Bound on identity provider and cache calls | `5000` |
//! | `AUDITORS_FILE` | JSON list of provisioned auditors | `auditors.json` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! A missing variable falls back to its default with a warning. An
//! unparseable number does the same. An unparseable URL or an unknown cache
//! backend is fatal.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const API_HOST_ENV: &str = "API_HOST";
pub const IDENTITY_PROVIDER_URL_ENV: &str = "IDENTITY_PROVIDER_URL";
pub const CACHE_BACKEND_ENV: &str = "CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const CACHE_CAPACITY_ENV: &str = "CACHE_CAPACITY";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const ROLE_TTL_ENV: &str = "ROLE_TTL_SECS";
pub const REPORT_KEY_TTL_ENV: &str = "REPORT_KEY_TTL_SECS";
pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_MS";
pub const AUDITORS_FILE_ENV: &str = "AUDITORS_FILE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 1323;
const DEFAULT_IDENTITY_PROVIDER_URL: &str = "http://localhost:9000";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_CACHE_CAPACITY: usize = 10_000;
const DEFAULT_SESSION_TTL_SECS: u64 = 300;
const DEFAULT_ROLE_TTL_SECS: u64 = 3600;
const DEFAULT_REPORT_KEY_TTL_SECS: u64 = 7 * 24 * 3600;
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 5000;
const DEFAULT_AUDITORS_FILE: &str = "auditors.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is misconfigured ({value:?}): {reason}")]
    Misconfigured {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which store backs the cache layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

/// Fully resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub api_host: Url,
    pub identity_provider_url: Url,
    pub cache_backend: CacheBackendKind,
    pub redis_url: Url,
    pub cache_capacity: usize,
    pub session_ttl: Duration,
    pub role_ttl: Duration,
    pub report_key_ttl: Duration,
    pub upstream_timeout: Duration,
    pub auditors_file: PathBuf,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };

        let host = env.string(HOST_ENV, DEFAULT_HOST);
        let port = env.number(PORT_ENV, DEFAULT_PORT);
        let api_host = env.url(API_HOST_ENV, &format!("http://localhost:{port}"))?;
        let identity_provider_url =
            env.url(IDENTITY_PROVIDER_URL_ENV, DEFAULT_IDENTITY_PROVIDER_URL)?;
        let redis_url = env.url(REDIS_URL_ENV, DEFAULT_REDIS_URL)?;

        let cache_backend = match env.string(CACHE_BACKEND_ENV, "redis").to_lowercase().as_str() {
            "redis" => CacheBackendKind::Redis,
            "memory" => CacheBackendKind::Memory,
            other => {
                return Err(ConfigError::Misconfigured {
                    var: CACHE_BACKEND_ENV,
                    value: other.to_string(),
                    reason: "expected `redis` or `memory`".to_string(),
                })
            }
        };

        Ok(Self {
            host,
            port,
            api_host,
            identity_provider_url,
            cache_backend,
            redis_url,
            cache_capacity: env.number(CACHE_CAPACITY_ENV, DEFAULT_CACHE_CAPACITY),
            session_ttl: Duration::from_secs(env.positive(SESSION_TTL_ENV, DEFAULT_SESSION_TTL_SECS)),
            role_ttl: Duration::from_secs(env.positive(ROLE_TTL_ENV, DEFAULT_ROLE_TTL_SECS)),
            report_key_ttl: Duration::from_secs(
                env.positive(REPORT_KEY_TTL_ENV, DEFAULT_REPORT_KEY_TTL_SECS),
            ),
            upstream_timeout: Duration::from_millis(
                env.positive(UPSTREAM_TIMEOUT_ENV, DEFAULT_UPSTREAM_TIMEOUT_MS),
            ),
            auditors_file: PathBuf::from(env.string(AUDITORS_FILE_ENV, DEFAULT_AUDITORS_FILE)),
        })
    }

    /// `host:port` to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    fn raw(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, var: &'static str, default: &str) -> String {
        self.raw(var).unwrap_or_else(|| {
            tracing::warn!(var, default, "environment variable not set, using default");
            default.to_string()
        })
    }

    fn number<T>(&self, var: &'static str, default: T) -> T
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let Some(value) = self.raw(var) else {
            tracing::warn!(var, %default, "environment variable not set, using default");
            return default;
        };
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(var, value = %value, %default, "environment variable is not a number, using default");
            default
        })
    }

    /// Like [`Env::number`], but zero also falls back to `default`.
    fn positive(&self, var: &'static str, default: u64) -> u64 {
        match self.number(var, default) {
            0 => {
                tracing::warn!(var, %default, "environment variable must be greater than zero, using default");
                default
            }
            value => value,
        }
    }

    fn url(&self, var: &'static str, default: &str) -> Result<Url, ConfigError> {
        let value = self.string(var, default);
        Url::parse(&value).map_err(|e| ConfigError::Misconfigured {
            var,
            value,
            reason: e.to_string(),
        })
    }
}
