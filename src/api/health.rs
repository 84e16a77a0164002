// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Cache backend reachability ("ok" or "unavailable").
    pub cache: String,
    /// Cache backend in use ("memory" or "redis").
    pub cache_backend: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// An unreachable cache only degrades the service: lookups fall through to
/// the identity provider and the auditor directory. The probe therefore
/// still answers 200 and reports `degraded`.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready, possibly degraded", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> Json<ReadyResponse> {
    let cache_ok = state.cache.is_available().await;

    Json(ReadyResponse {
        status: if cache_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            cache: if cache_ok { "ok" } else { "unavailable" }.to_string(),
            cache_backend: state.cache.mode().to_string(),
        },
    })
}
