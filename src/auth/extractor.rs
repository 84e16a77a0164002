// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for what the gates attached to the request.
//!
//! The gates in [`middleware`](super::middleware) do the work; these only
//! read request extensions:
//!
//! ```rust,ignore
//! async fn my_handler(Verified(session): Verified, CurrentRole(role): CurrentRole) {
//!     // session was verified by a strict session gate
//! }
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, Role, Session};

/// Outcome of the session gate for this request.
///
/// Under a soft gate `session` may be absent and `failure` holds the reason.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub session: Option<Session>,
    pub failure: Option<AuthError>,
}

impl SessionContext {
    pub fn verified(session: Session) -> Self {
        Self {
            session: Some(session),
            failure: None,
        }
    }

    pub fn failed(failure: AuthError) -> Self {
        Self {
            session: None,
            failure: Some(failure),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Role resolved by the role gate; `Anonymous` when no role gate ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentRole(pub Role);

impl<S: Send + Sync> FromRequestParts<S> for CurrentRole {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentRole>()
            .copied()
            .unwrap_or(CurrentRole(Role::Anonymous)))
    }
}

/// Set by the report-key gate once the presented key matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyVerified(pub bool);

impl<S: Send + Sync> FromRequestParts<S> for KeyVerified {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<KeyVerified>()
            .copied()
            .unwrap_or(KeyVerified(false)))
    }
}

/// A verified session, or the rejection recorded by the session gate.
pub struct Verified(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for Verified {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts.extensions.get::<SessionContext>();
        if let Some(session) = context.and_then(|c| c.session.clone()) {
            return Ok(Verified(session));
        }
        Err(context
            .and_then(|c| c.failure.clone())
            .unwrap_or(AuthError::MissingSession))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::Utc;

    fn parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    fn session() -> Session {
        Session {
            id: "abc".to_string(),
            username: "alice".to_string(),
            verified_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::seconds(300),
        }
    }

    #[tokio::test]
    async fn defaults_without_gates() {
        let mut parts = parts();
        let context = SessionContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(context.session.is_none());

        let CurrentRole(role) = CurrentRole::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(role, Role::Anonymous);

        let KeyVerified(verified) = KeyVerified::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(!verified);

        let result = Verified::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.err(), Some(AuthError::MissingSession));
    }

    #[tokio::test]
    async fn verified_reads_gate_outcome() {
        let mut parts = parts();
        parts.extensions.insert(SessionContext::verified(session()));
        let Verified(found) = Verified::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found.username, "alice");

        let mut parts = self::parts();
        parts
            .extensions
            .insert(SessionContext::failed(AuthError::SessionExpired));
        let result = Verified::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.err(), Some(AuthError::SessionExpired));
    }
}
