// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gate interceptors for Axum.
//!
//! Each gate is an `axum::middleware::from_fn_with_state` function:
//!
//! - [`session_gate`]: reads the session identifier, validates it, and stores
//!   a [`SessionContext`] in the request extensions
//! - [`role_gate`]: resolves the role for the session found there and stores
//!   a [`CurrentRole`]
//! - [`report_key_gate`]: checks the `{id}/{key}` path pair and stores
//!   [`KeyVerified`]
//!
//! Session and role gates are generic over a [`GatePolicy`]. [`Strict`]
//! answers a failed check with the error response and never calls the
//! handler. [`Soft`] records the outcome and always continues.
//!
//! The session identifier comes from the `x-sid` header, or the `sid` query
//! parameter when the header is absent.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::extractor::{CurrentRole, KeyVerified, SessionContext};
use super::report_keys::ReportKeyIssuer;
use super::roles::{Role, RoleResolver};
use super::session::{Session, SessionValidator};
use super::AuthError;

/// Header carrying the session identifier.
pub const SESSION_HEADER: &str = "x-sid";

/// Query parameter fallback for the session identifier.
pub const SESSION_QUERY_PARAM: &str = "sid";

/// Strict or soft handling of a failed gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    Strict,
    Soft,
}

/// What a gate does with the outcome of its check.
pub trait GatePolicy: Send + Sync + 'static {
    const MODE: GateMode;

    fn admit_session(outcome: Result<Session, AuthError>) -> Result<SessionContext, AuthError>;

    fn admit_role(context: &SessionContext, role: Role) -> Result<Role, AuthError>;
}

/// Reject on failure.
pub struct Strict;

/// Record and continue.
pub struct Soft;

impl GatePolicy for Strict {
    const MODE: GateMode = GateMode::Strict;

    fn admit_session(outcome: Result<Session, AuthError>) -> Result<SessionContext, AuthError> {
        outcome.map(SessionContext::verified)
    }

    fn admit_role(context: &SessionContext, role: Role) -> Result<Role, AuthError> {
        if role.is_auditor() {
            return Ok(role);
        }
        match (&context.session, &context.failure) {
            (Some(_), _) => Err(AuthError::InsufficientRole),
            (None, Some(failure)) => Err(failure.clone()),
            (None, None) => Err(AuthError::MissingSession),
        }
    }
}

impl GatePolicy for Soft {
    const MODE: GateMode = GateMode::Soft;

    fn admit_session(outcome: Result<Session, AuthError>) -> Result<SessionContext, AuthError> {
        Ok(match outcome {
            Ok(session) => SessionContext::verified(session),
            Err(failure) => SessionContext::failed(failure),
        })
    }

    fn admit_role(_context: &SessionContext, role: Role) -> Result<Role, AuthError> {
        Ok(role)
    }
}

/// Services the session and role gates need. Cheap to clone.
#[derive(Clone)]
pub struct AuthGate {
    pub validator: Arc<SessionValidator>,
    pub roles: Arc<RoleResolver>,
}

impl AuthGate {
    pub fn new(validator: Arc<SessionValidator>, roles: Arc<RoleResolver>) -> Self {
        Self { validator, roles }
    }
}

/// Session identifier presented by the caller, if any.
pub fn session_identifier(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(identifier) = from_header {
        return Some(identifier.to_string());
    }

    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == SESSION_QUERY_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Session gate.
pub async fn session_gate<P: GatePolicy>(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = match session_identifier(request.headers(), request.uri()) {
        Some(identifier) => gate.validator.validate(&identifier).await,
        None => Err(AuthError::MissingSession),
    };

    match P::admit_session(outcome) {
        Ok(context) => {
            if let Some(failure) = &context.failure {
                tracing::debug!(
                    error_code = failure.error_code(),
                    "session not verified, continuing anonymously"
                );
            }
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(
                error_code = e.error_code(),
                mode = ?P::MODE,
                "request rejected by session gate"
            );
            e.into_response()
        }
    }
}

/// Role gate. Must run after a session gate.
pub async fn role_gate<P: GatePolicy>(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = request
        .extensions()
        .get::<SessionContext>()
        .cloned()
        .unwrap_or_default();
    let role = gate.roles.resolve(context.session.as_ref()).await;

    match P::admit_role(&context, role) {
        Ok(role) => {
            request.extensions_mut().insert(CurrentRole(role));
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(
                error_code = e.error_code(),
                mode = ?P::MODE,
                role = %role,
                "request rejected by role gate"
            );
            e.into_response()
        }
    }
}

/// Report-key gate for routes shaped `.../{id}/{key}`.
///
/// Every failure answers 403, whatever the underlying reason.
pub async fn report_key_gate(
    State(keys): State<Arc<ReportKeyIssuer>>,
    Path((report_id, key)): Path<(String, String)>,
    mut request: Request,
    next: Next,
) -> Response {
    if !keys.verify(&report_id, &key) {
        return AuthError::InvalidReportKey.into_response();
    }
    request.extensions_mut().insert(KeyVerified(true));
    next.run(request).await
}
