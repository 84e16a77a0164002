// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Coarse classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Missing, invalid or expired session.
    Unauthenticated,
    /// Authenticated but not allowed: wrong role or wrong/expired report key.
    Forbidden,
    /// Identity provider could not be consulted.
    UpstreamUnavailable,
}

/// Error raised by the gate interceptors.
///
/// Every variant terminates a strict chain before the handler runs. Soft gates
/// record the error in the request context instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No session identifier on the request
    MissingSession,
    /// Identity provider rejected the session identifier
    InvalidSession,
    /// Identity provider reports the session as expired
    SessionExpired,
    /// Identity provider unreachable, timed out, or answered garbage
    IdentityProviderUnavailable(String),
    /// Session is valid but does not carry the auditor role
    InsufficientRole,
    /// Report key missing, wrong, expired, or report unknown
    InvalidReportKey,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingSession => "missing_session",
            AuthError::InvalidSession => "invalid_session",
            AuthError::SessionExpired => "session_expired",
            AuthError::IdentityProviderUnavailable(_) => "identity_provider_unavailable",
            AuthError::InsufficientRole => "insufficient_role",
            AuthError::InvalidReportKey => "invalid_report_key",
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::MissingSession | AuthError::InvalidSession | AuthError::SessionExpired => {
                AuthErrorKind::Unauthenticated
            }
            AuthError::InsufficientRole | AuthError::InvalidReportKey => AuthErrorKind::Forbidden,
            AuthError::IdentityProviderUnavailable(_) => AuthErrorKind::UpstreamUnavailable,
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// An unreachable identity provider is reported to the client as a plain
    /// authentication failure.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            AuthErrorKind::Unauthenticated | AuthErrorKind::UpstreamUnavailable => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Client-facing message. Never includes upstream error details.
    fn public_message(&self) -> String {
        match self {
            AuthError::IdentityProviderUnavailable(_) => {
                "Session could not be verified, try again later".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingSession => {
                write!(f, "Session identifier is required (x-sid header or sid query parameter)")
            }
            AuthError::InvalidSession => write!(f, "Session identifier is not valid"),
            AuthError::SessionExpired => write!(f, "Session has expired"),
            AuthError::IdentityProviderUnavailable(msg) => {
                write!(f, "Identity provider unavailable: {msg}")
            }
            AuthError::InsufficientRole => write!(f, "Auditor role required"),
            AuthError::InvalidReportKey => write!(f, "Access to this report is denied"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
