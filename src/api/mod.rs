// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch},
    Router,
};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::report_key_gate, Role},
    models::{
        CreateReportRequest, Report, ReportCreatedResponse, Review, ReviewRequest, ReviewVerdict,
        ReviewView, ReviewsResponse, WhoAmIResponse,
    },
    state::AppState,
};

pub mod chain;
pub mod health;
pub mod reports;
pub mod reviews;
pub mod session;

use chain::{MiddlewareChain, RouteClass};

/// Build the application router. Each group of routes is wrapped in the
/// chain of its [`RouteClass`].
pub fn router(state: AppState) -> Router {
    let gate = state.gate.clone();
    let chain = |class| MiddlewareChain::for_class(class);

    let static_routes = Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let keyed_routes = Router::new()
        .route("/report/{id}/{key}", get(reports::get_report))
        .route_layer(from_fn_with_state(state.report_keys.clone(), report_key_gate));

    let optional_routes = Router::new().route("/whoami", get(session::whoami));

    let authenticated_routes = Router::new().route(
        "/review/{ids}",
        get(reviews::get_reviews).post(reviews::record_review),
    );

    let protected_routes = Router::new().route("/report", patch(reports::create_report));

    Router::new()
        .merge(chain(RouteClass::Static).apply(static_routes, &gate))
        .merge(chain(RouteClass::Static).apply(keyed_routes, &gate))
        .merge(chain(RouteClass::Optional).apply(optional_routes, &gate))
        .merge(chain(RouteClass::Authenticated).apply(authenticated_routes, &gate))
        .merge(chain(RouteClass::Protected).apply(protected_routes, &gate))
        .with_state(state)
}

/// [`router`] with trailing slashes trimmed before routing.
pub fn service(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        session::whoami,
        reviews::get_reviews,
        reviews::record_review,
        reports::create_report,
        reports::get_report
    ),
    components(
        schemas(
            Role,
            Review,
            ReviewVerdict,
            ReviewView,
            ReviewsResponse,
            ReviewRequest,
            Report,
            CreateReportRequest,
            ReportCreatedResponse,
            WhoAmIResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Session", description = "Caller identity as seen by the gate"),
        (name = "Reviews", description = "Moderation verdicts"),
        (name = "Reports", description = "Reports and their keyed detail view")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{self, header, Method, StatusCode},
        response::Response,
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::middleware::SESSION_HEADER;
    use crate::auth::provider::testing::StubProvider;
    use crate::cache::{Cache, CacheBackend, MemoryCache};
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::storage::{AuditorRecord, InMemoryAuditorDirectory};

    struct Harness {
        app: NormalizePath<Router>,
        state: AppState,
        provider: Arc<StubProvider>,
    }

    fn harness() -> Harness {
        let config = Config::from_lookup(|var| match var {
            "CACHE_BACKEND" => Some("memory".to_string()),
            "API_HOST" => Some("https://mod.example.org".to_string()),
            _ => None,
        })
        .unwrap();
        let clock = Arc::new(ManualClock::new());
        let cache = Cache::new(CacheBackend::Memory(Arc::new(MemoryCache::new(
            128,
            clock.clone(),
        ))));
        let provider = Arc::new(
            StubProvider::new()
                .with_session("sid-alice", "alice")
                .with_session("sid-bob", "bob"),
        );
        let directory = Arc::new(InMemoryAuditorDirectory::from_records([AuditorRecord {
            username: "Alice".to_string(),
            granted_at: Utc::now(),
        }]));

        let state = AppState::new(config, cache, provider.clone(), directory, clock).unwrap();
        Harness {
            app: service(state.clone()),
            state,
            provider,
        }
    }

    fn request(method: Method, uri: &str, sid: Option<&str>, body: Option<Value>) -> http::Request<Body> {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(sid) = sid {
            builder = builder.header(SESSION_HEADER, sid);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &NormalizePath<Router>, request: http::Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn report_body() -> Option<Value> {
        Some(json!({ "submission_id": 42, "reason": "stolen artwork" }))
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let h = harness();
        let _ = router(h.state).into_make_service();
    }

    #[tokio::test]
    async fn protected_route_without_session_never_reaches_handler() {
        let h = harness();
        let response = send(&h.app, request(Method::PATCH, "/report", None, report_body())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "missing_session");

        assert_eq!(h.provider.calls(), 0);
        assert!(h.state.store.read().await.report(1).is_err());
    }

    #[tokio::test]
    async fn protected_route_requires_auditor() {
        let h = harness();
        let response = send(
            &h.app,
            request(Method::PATCH, "/report", Some("sid-bob"), report_body()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(h.state.store.read().await.report(1).is_err());

        let response = send(
            &h.app,
            request(Method::PATCH, "/report", Some("sid-alice"), report_body()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        let key = body["key"].as_str().unwrap();
        assert_eq!(
            body["url"],
            format!("https://mod.example.org/report/{}/{key}", body["report_id"])
        );
    }

    #[tokio::test]
    async fn report_detail_requires_matching_key() {
        let h = harness();
        let created = json_body(
            send(
                &h.app,
                request(Method::PATCH, "/report", Some("sid-alice"), report_body()),
            )
            .await,
        )
        .await;
        let id = created["report_id"].as_u64().unwrap();
        let key = created["key"].as_str().unwrap();

        // No session needed: the key is the credential.
        let response = send(
            &h.app,
            request(Method::GET, &format!("/report/{id}/{key}"), None, None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["submission_id"], 42);
        assert_eq!(report["reported_by"], "alice");

        let response = send(
            &h.app,
            request(Method::GET, &format!("/report/{id}/wrong"), None, None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(
            &h.app,
            request(Method::GET, &format!("/report/{}/{key}", id + 1), None, None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn key_issued_for_unknown_report_passes_gate_but_finds_nothing() {
        let h = harness();
        let access = h.state.report_keys.issue("42").unwrap();

        let response = send(
            &h.app,
            request(Method::GET, &format!("/report/42/{}", access.key), None, None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&h.app, request(Method::GET, "/report/42/wrong", None, None)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn reviews_need_a_session_but_not_a_role() {
        let h = harness();
        let response = send(&h.app, request(Method::GET, "/review/1,2", None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &h.app,
            request(Method::GET, "/review/1,2", Some("sid-bob"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["role"], "anonymous");
        assert_eq!(body["reviews"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn only_auditors_record_reviews_and_see_notes() {
        let h = harness();
        let verdict = json!({ "verdict": "rejected", "notes": "traced artwork" });

        let response = send(
            &h.app,
            request(Method::POST, "/review/5", Some("sid-bob"), Some(verdict.clone())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(
            &h.app,
            request(Method::POST, "/review/5", Some("sid-alice"), Some(verdict)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let anonymous = json_body(
            send(&h.app, request(Method::GET, "/review/5", Some("sid-bob"), None)).await,
        )
        .await;
        assert_eq!(anonymous["reviews"][0]["verdict"], "rejected");
        assert!(anonymous["reviews"][0].get("notes").is_none());

        let auditor = json_body(
            send(&h.app, request(Method::GET, "/review/5", Some("sid-alice"), None)).await,
        )
        .await;
        assert_eq!(auditor["role"], "auditor");
        assert_eq!(auditor["reviews"][0]["notes"], "traced artwork");
    }

    #[tokio::test]
    async fn role_is_checked_before_review_body() {
        let h = harness();
        let garbage = json!({ "verdict": "maybe" });

        let response = send(
            &h.app,
            request(Method::POST, "/review/5", Some("sid-bob"), Some(garbage.clone())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(
            &h.app,
            request(Method::POST, "/review/5", Some("sid-alice"), Some(garbage)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_review_ids_are_bad_requests() {
        let h = harness();
        let response = send(
            &h.app,
            request(Method::GET, "/review/1,x", Some("sid-bob"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn whoami_is_soft() {
        let h = harness();
        let body = json_body(send(&h.app, request(Method::GET, "/whoami", None, None)).await).await;
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["role"], "anonymous");
        assert!(body.get("session_error").is_none());

        let body = json_body(
            send(&h.app, request(Method::GET, "/whoami", Some("sid-nobody"), None)).await,
        )
        .await;
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["session_error"], "invalid_session");

        let body = json_body(
            send(&h.app, request(Method::GET, "/whoami?sid=sid-alice", None, None)).await,
        )
        .await;
        assert_eq!(body["username"], "alice");
        assert_eq!(body["role"], "auditor");
    }

    #[tokio::test]
    async fn sessions_are_verified_once_per_ttl() {
        let h = harness();
        for _ in 0..3 {
            let response = send(
                &h.app,
                request(Method::GET, "/review/1", Some("sid-bob"), None),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn static_layers_apply_to_every_class() {
        let h = harness();
        let response = send(&h.app, request(Method::GET, "/health/live/", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let response = send(&h.app, request(Method::PATCH, "/report", None, None)).await;
        assert!(response.headers().contains_key("x-request-id"));

        let preflight = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/report")
            .header(header::ORIGIN, "https://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
            .body(Body::empty())
            .unwrap();
        let response = send(&h.app, preflight).await;
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn readiness_reports_cache_backend() {
        let h = harness();
        let response = send(&h.app, request(Method::GET, "/health/ready", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["cache_backend"], "memory");
    }
}
