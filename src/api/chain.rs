// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Middleware Chains
//!
//! Every route belongs to a [`RouteClass`]. The class alone decides which
//! interceptors run and in which order:
//!
//! | Class | Interceptors (outermost first) |
//! |-------|--------------------------------|
//! | `Static` | panic recovery, request id, trace, decompression, compression, `www.` redirect, CORS |
//! | `Optional` | static set, soft session, soft role |
//! | `Authenticated` | static set, strict session, soft role |
//! | `Protected` | static set, strict session, strict role |
//!
//! A role gate can only be expressed together with the session gate that
//! precedes it ([`IdentityGate::SessionThenRole`]), so role resolution never
//! runs before a session outcome exists.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    decompression::RequestDecompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::middleware::{role_gate, session_gate, AuthGate, GateMode, Soft, Strict};

/// Sensitivity class of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Static,
    Optional,
    Authenticated,
    Protected,
}

/// Identity checks of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityGate {
    Open,
    SessionThenRole { session: GateMode, role: GateMode },
}

/// One step of a composed chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interceptor {
    CatchPanic,
    RequestId,
    Trace,
    Decompression,
    Compression,
    NonWwwRedirect,
    Cors,
    Session(GateMode),
    Role(GateMode),
}

const STATIC_INTERCEPTORS: [Interceptor; 7] = [
    Interceptor::CatchPanic,
    Interceptor::RequestId,
    Interceptor::Trace,
    Interceptor::Decompression,
    Interceptor::Compression,
    Interceptor::NonWwwRedirect,
    Interceptor::Cors,
];

const CORS_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::PUT,
    Method::PATCH,
    Method::POST,
    Method::DELETE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiddlewareChain {
    identity: IdentityGate,
}

impl MiddlewareChain {
    pub fn for_class(class: RouteClass) -> Self {
        let identity = match class {
            RouteClass::Static => IdentityGate::Open,
            RouteClass::Optional => IdentityGate::SessionThenRole {
                session: GateMode::Soft,
                role: GateMode::Soft,
            },
            RouteClass::Authenticated => IdentityGate::SessionThenRole {
                session: GateMode::Strict,
                role: GateMode::Soft,
            },
            RouteClass::Protected => IdentityGate::SessionThenRole {
                session: GateMode::Strict,
                role: GateMode::Strict,
            },
        };
        Self { identity }
    }

    /// Interceptors in the order a request passes through them.
    pub fn interceptors(&self) -> Vec<Interceptor> {
        let mut chain = STATIC_INTERCEPTORS.to_vec();
        if let IdentityGate::SessionThenRole { session, role } = self.identity {
            chain.push(Interceptor::Session(session));
            chain.push(Interceptor::Role(role));
        }
        chain
    }

    /// Wrap every route of `router` in this chain.
    ///
    /// Identity gates go on as route layers, so unmatched paths still get a
    /// plain 404 rather than an authentication error.
    pub fn apply<S>(&self, router: Router<S>, gate: &AuthGate) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = match self.identity {
            IdentityGate::Open => router,
            IdentityGate::SessionThenRole { session, role } => {
                // Added innermost first: the role gate must end up inside the
                // session gate.
                let router = match role {
                    GateMode::Strict => {
                        router.route_layer(from_fn_with_state(gate.clone(), role_gate::<Strict>))
                    }
                    GateMode::Soft => {
                        router.route_layer(from_fn_with_state(gate.clone(), role_gate::<Soft>))
                    }
                };
                match session {
                    GateMode::Strict => router
                        .route_layer(from_fn_with_state(gate.clone(), session_gate::<Strict>)),
                    GateMode::Soft => {
                        router.route_layer(from_fn_with_state(gate.clone(), session_gate::<Soft>))
                    }
                }
            }
        };

        router.layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new())
                .map_request(|request: axum::http::Request<_>| request.map(Body::new))
                .layer(from_fn(non_www_redirect))
                .layer(cors_layer()),
        )
    }
}

/// Permanently redirect `www.<host>` to `<host>`, keeping path and query.
async fn non_www_redirect(request: Request, next: Next) -> Response {
    let Some(bare_host) = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(|host| host.strip_prefix("www."))
    else {
        return next.run(request).await;
    };

    let scheme = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let path = request
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str());

    match HeaderValue::from_str(&format!("{scheme}://{bare_host}{path}")) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(CORS_METHODS.to_vec())
        .allow_headers(Any)
}
