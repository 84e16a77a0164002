// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use url::Url;

use crate::{
    auth::{KeyVerified, Verified},
    error::ApiError,
    models::{CreateReportRequest, Report, ReportCreatedResponse},
    state::AppState,
};

/// Shareable detail URL for a report under the advertised host.
pub fn report_url(api_host: &Url, report_id: u64, key: &str) -> Result<Url, ApiError> {
    let mut base = api_host.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("report/{report_id}/{key}"))
        .map_err(|e| ApiError::internal(format!("Could not build report URL: {e}")))
}

#[utoipa::path(
    patch,
    path = "/report",
    tag = "Reports",
    request_body = CreateReportRequest,
    params(("x-sid" = String, Header, description = "Session identifier")),
    responses(
        (status = 201, description = "Report stored and access key issued", body = ReportCreatedResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Caller is not an auditor"),
        (status = 422, description = "Empty report reason")
    )
)]
pub async fn create_report(
    State(state): State<AppState>,
    Verified(session): Verified,
    Json(request): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<ReportCreatedResponse>), ApiError> {
    let report = state
        .store
        .write()
        .await
        .create_report(request, &session.username)?;

    let access = state
        .report_keys
        .issue(&report.id.to_string())
        .map_err(|e| ApiError::internal(format!("Could not issue report key: {e}")))?;
    let url = report_url(&state.config.api_host, report.id, &access.key)?;

    tracing::info!(
        report_id = report.id,
        submission_id = report.submission_id,
        reported_by = %session.username,
        "report created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ReportCreatedResponse {
            report_id: report.id,
            key: access.key,
            url: url.to_string(),
            expires_at: access.expires_at,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/report/{id}/{key}",
    tag = "Reports",
    params(
        ("id" = String, Path, description = "Report id"),
        ("key" = String, Path, description = "Report access key")
    ),
    responses(
        (status = 200, description = "Report detail", body = Report),
        (status = 403, description = "Key missing, wrong or expired")
    )
)]
pub async fn get_report(
    State(state): State<AppState>,
    Path((report_id, _key)): Path<(String, String)>,
    KeyVerified(verified): KeyVerified,
) -> Result<Json<Report>, ApiError> {
    if !verified {
        return Err(ApiError::forbidden("Access to this report is denied"));
    }
    let report_id: u64 = report_id
        .parse()
        .map_err(|_| ApiError::not_found("Report not found"))?;
    let report = state.store.read().await.report(report_id)?;
    Ok(Json(report))
}
