// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;

use crate::{
    auth::{AuthError, CurrentRole, SessionContext},
    models::WhoAmIResponse,
};

/// Report who the gate resolved the caller to. Never fails.
#[utoipa::path(
    get,
    path = "/whoami",
    tag = "Session",
    params(("x-sid" = Option<String>, Header, description = "Session identifier")),
    responses(
        (status = 200, description = "Resolved identity and role", body = WhoAmIResponse)
    )
)]
pub async fn whoami(context: SessionContext, CurrentRole(role): CurrentRole) -> Json<WhoAmIResponse> {
    let session_error = context
        .failure
        .filter(|failure| *failure != AuthError::MissingSession)
        .map(|failure| failure.error_code().to_string());

    Json(WhoAmIResponse {
        authenticated: context.session.is_some(),
        username: context.session.as_ref().map(|s| s.username.clone()),
        role,
        session_expires_at: context.session.as_ref().map(|s| s.expires_at),
        session_error,
    })
}
