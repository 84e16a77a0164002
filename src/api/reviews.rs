// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::{CurrentRole, Verified},
    error::ApiError,
    models::{Review, ReviewRequest, ReviewView, ReviewsResponse},
    state::AppState,
};

/// Upper bound on submission ids in one request.
pub const MAX_SUBMISSION_IDS: usize = 100;

/// Parse a comma separated list of submission ids, dropping duplicates.
pub fn parse_submission_ids(raw: &str) -> Result<Vec<u64>, ApiError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id: u64 = part
            .parse()
            .map_err(|_| ApiError::bad_request(format!("Invalid submission id: {part}")))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if ids.is_empty() {
        return Err(ApiError::bad_request("At least one submission id is required"));
    }
    if ids.len() > MAX_SUBMISSION_IDS {
        return Err(ApiError::bad_request(format!(
            "At most {MAX_SUBMISSION_IDS} submission ids per request"
        )));
    }
    Ok(ids)
}

#[utoipa::path(
    get,
    path = "/review/{ids}",
    tag = "Reviews",
    params(
        ("ids" = String, Path, description = "Comma separated submission ids"),
        ("x-sid" = String, Header, description = "Session identifier")
    ),
    responses(
        (status = 200, description = "Review state per submission", body = ReviewsResponse),
        (status = 400, description = "Malformed id list"),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn get_reviews(
    State(state): State<AppState>,
    Path(ids): Path<String>,
    CurrentRole(role): CurrentRole,
) -> Result<Json<ReviewsResponse>, ApiError> {
    let ids = parse_submission_ids(&ids)?;
    let store = state.store.read().await;
    let reviews = store
        .reviews_for(&ids)
        .iter()
        .map(|(id, review)| ReviewView::new(*id, review.as_ref(), role))
        .collect();
    Ok(Json(ReviewsResponse { role, reviews }))
}

#[utoipa::path(
    post,
    path = "/review/{ids}",
    tag = "Reviews",
    request_body = ReviewRequest,
    params(
        ("ids" = String, Path, description = "Comma separated submission ids"),
        ("x-sid" = String, Header, description = "Session identifier")
    ),
    responses(
        (status = 201, description = "Verdict recorded", body = [Review]),
        (status = 400, description = "Malformed id list"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Caller is not an auditor"),
        (status = 422, description = "Malformed review body")
    )
)]
pub async fn record_review(
    State(state): State<AppState>,
    Path(ids): Path<String>,
    Verified(session): Verified,
    CurrentRole(role): CurrentRole,
    request: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<Review>>), ApiError> {
    if !role.is_auditor() {
        return Err(ApiError::forbidden("Only auditors can record reviews"));
    }
    let Json(request) = request.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let ids = parse_submission_ids(&ids)?;

    let mut store = state.store.write().await;
    let reviews = store.record_review(&ids, &request, &session.username);
    tracing::info!(
        reviewer = %session.username,
        count = reviews.len(),
        verdict = ?request.verdict,
        "reviews recorded"
    );
    Ok((StatusCode::CREATED, Json(reviews)))
}
