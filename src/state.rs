// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::{
    AuthGate, IdentityProvider, ReportKeyError, ReportKeyIssuer, RoleResolver, SessionValidator,
};
use crate::cache::Cache;
use crate::clock::Clock;
use crate::config::Config;
use crate::storage::{AuditorDirectory, ModerationStore};

/// Services shared by every request. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Cache,
    pub gate: AuthGate,
    pub report_keys: Arc<ReportKeyIssuer>,
    pub store: Arc<RwLock<ModerationStore>>,
}

impl AppState {
    pub fn new(
        config: Config,
        cache: Cache,
        provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn AuditorDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ReportKeyError> {
        let validator = SessionValidator::new(cache.clone(), provider, clock.clone())
            .with_session_ttl(config.session_ttl)
            .with_upstream_timeout(config.upstream_timeout);
        let roles = RoleResolver::new(cache.clone(), directory).with_ttl(config.role_ttl);
        let report_keys = ReportKeyIssuer::new(clock)?.with_ttl(config.report_key_ttl);

        Ok(Self {
            config: Arc::new(config),
            cache,
            gate: AuthGate::new(Arc::new(validator), Arc::new(roles)),
            report_keys: Arc::new(report_keys),
            store: Arc::new(RwLock::new(ModerationStore::new())),
        })
    }
}
