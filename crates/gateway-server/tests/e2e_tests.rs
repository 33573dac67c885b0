//! End-to-end tests for the API gateway.
//!
//! These tests drive the assembled router in-process and cover:
//! - public and protected routing
//! - credential rejection and rate limiting
//! - downstream failures
//! - response headers, counters and access log records

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use gateway_config::GatewayConfig;
use gateway_core::{headers, CallerIdentity};
use gateway_resilience::RateLimitConfig;
use gateway_server::routes::{create_router, with_pipeline};
use gateway_server::{AppState, TokenIssuer};
use gateway_telemetry::{names, AccessLogger, AccessOutcome, MemorySink};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: AppState,
    sink: Arc<MemorySink>,
}

impl TestApp {
    fn new(max_requests: u32) -> Self {
        let mut config = GatewayConfig::default();
        config.rate_limit = RateLimitConfig::new(Duration::from_secs(60), max_requests);

        let sink = Arc::new(MemorySink::new());
        let state = AppState::builder()
            .config(config)
            .access_logger(AccessLogger::new(sink.clone()))
            .build()
            .unwrap();

        Self {
            router: create_router(state.clone()),
            state,
            sink,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, authorization: Option<&str>) -> Response {
        self.send(build(Method::GET, uri, authorization)).await
    }

    fn counter(&self, name: &str) -> u64 {
        self.state.metrics.get(name)
    }

    fn token_at(&self, subject: &str, now: i64) -> String {
        TokenIssuer::from_settings(&self.state.config.auth)
            .issue_at(subject, now)
            .unwrap()
            .token
    }

    fn bearer(&self, subject: &str) -> String {
        format!(
            "Bearer {}",
            self.token_at(subject, chrono::Utc::now().timestamp())
        )
    }
}

fn build(method: Method, uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[cfg(test)]
mod public_route_tests {
    use super::*;

    #[tokio::test]
    async fn test_root_endpoint() {
        let app = TestApp::new(5);

        let response = app.get("/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "API Gateway running");
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let app = TestApp::new(5);

        let response = app.get("/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn test_login_without_credentials_succeeds() {
        let app = TestApp::new(5);

        let response = app.send(build(Method::POST, "/login", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert!(!json["token"].as_str().unwrap().is_empty());
        assert_eq!(json["token_type"], "bearer");
        assert_eq!(json["expires_in"], 7_200);

        assert_eq!(app.counter(names::TOTAL_REQUESTS), 1);
        assert_eq!(app.counter(names::UNAUTHORIZED), 0);
    }

    #[tokio::test]
    async fn test_public_paths_never_consume_quota_or_reject() {
        let app = TestApp::new(1);

        for uri in [
            "/",
            "/health",
            "/docs",
            "/openapi.json",
            "/metrics",
            "/metrics/prometheus",
        ] {
            for _ in 0..3 {
                let response = app.get(uri, Some("Bearer not-a-token")).await;
                assert_eq!(response.status(), StatusCode::OK, "{uri}");
            }
        }

        assert_eq!(app.counter(names::TOTAL_REQUESTS), 18);
        assert_eq!(app.counter(names::SUCCESS), 18);
        assert_eq!(app.counter(names::UNAUTHORIZED), 0);
        assert_eq!(app.counter(names::RATE_LIMITED), 0);
    }

    #[tokio::test]
    async fn test_docs_endpoints() {
        let app = TestApp::new(5);

        let response = app.get("/openapi.json", None).await;
        let json = json_body(response).await;
        assert!(json["paths"]["/protected"].is_object());

        let response = app.get("/docs", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
    }
}

#[cfg(test)]
mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_login_then_access_protected() {
        let app = TestApp::new(5);

        let login = json_body(app.send(build(Method::POST, "/login", None)).await).await;
        let token = login["token"].as_str().unwrap();

        let response = app.get("/protected", Some(&format!("Bearer {token}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let header_id = response.headers()["x-correlation-id"]
            .to_str()
            .unwrap()
            .to_string();

        let json = json_body(response).await;
        assert_eq!(json["message"], "You accessed a protected API");
        assert_eq!(json["caller"], "user123");
        assert_eq!(json["correlation_id"], header_id);
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let app = TestApp::new(5);

        let response = app.get("/protected", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(json_body(response).await["detail"], "Not authenticated");

        assert_eq!(app.counter(names::TOTAL_REQUESTS), 1);
        assert_eq!(app.counter(names::UNAUTHORIZED), 1);
        assert_eq!(app.counter(names::SUCCESS), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let app = TestApp::new(5);
        let now = chrono::Utc::now().timestamp();
        let expired = app.token_at("user123", now - 3 * 60 * 60);

        let response = app
            .get("/protected", Some(&format!("Bearer {expired}")))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"detail": "Invalid or expired token"})
        );
        assert_eq!(app.counter(names::UNAUTHORIZED), 1);
    }

    #[tokio::test]
    async fn test_bare_token_is_accepted() {
        let app = TestApp::new(5);
        let token = app.token_at("u1", chrono::Utc::now().timestamp());

        let response = app.get("/protected", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let app = TestApp::new(5);
        let forged = TokenIssuer::new(
            b"not-the-secret",
            gateway_config::JwtAlgorithm::HS256,
            Duration::from_secs(60),
        )
        .issue("admin")
        .unwrap()
        .token;

        let response = app.get("/protected", Some(&format!("Bearer {forged}"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let records = app.sink.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].caller.is_none());
        assert_eq!(records[0].outcome, AccessOutcome::Unauthorized);
    }

    #[tokio::test]
    async fn test_rejected_credentials_never_reach_handler() {
        let app = TestApp::new(5);
        let invoked = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&invoked);
        let router = with_pipeline(
            Router::new().route(
                "/work",
                get(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        "done"
                    }
                }),
            ),
            Arc::clone(&app.state.pipeline),
        );

        for authorization in [None, Some("Bearer garbage"), Some("")] {
            let response = router
                .clone()
                .oneshot(build(Method::GET, "/work", authorization))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(app.counter(names::TOTAL_REQUESTS), 3);
        assert_eq!(app.counter(names::UNAUTHORIZED), 3);
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    #[tokio::test]
    async fn test_sixth_request_is_rate_limited() {
        let app = TestApp::new(5);
        let bearer = app.bearer("u1");

        let mut statuses = Vec::new();
        for _ in 0..6 {
            statuses.push(app.get("/protected", Some(&bearer)).await.status());
        }

        assert_eq!(
            statuses,
            vec![
                StatusCode::OK,
                StatusCode::OK,
                StatusCode::OK,
                StatusCode::OK,
                StatusCode::OK,
                StatusCode::TOO_MANY_REQUESTS,
            ]
        );
        assert_eq!(app.counter(names::SUCCESS), 5);
        assert_eq!(app.counter(names::RATE_LIMITED), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let app = TestApp::new(1);
        let bearer = app.bearer("u1");

        let first = app.get("/protected", Some(&bearer)).await;
        assert_eq!(first.headers()[headers::RATE_LIMIT_LIMIT], "1");
        assert_eq!(first.headers()[headers::RATE_LIMIT_REMAINING], "0");

        let response = app.get("/protected", Some(&bearer)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let retry_after: u64 = response.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
        assert_eq!(json_body(response).await["detail"], "Rate limit exceeded");

        let records = app.sink.records();
        assert_eq!(records[1].outcome, AccessOutcome::RateLimited);
        assert_eq!(records[1].caller, Some(CallerIdentity::new("u1")));
    }

    #[tokio::test]
    async fn test_quota_is_per_caller() {
        let app = TestApp::new(1);

        assert_eq!(
            app.get("/protected", Some(&app.bearer("a"))).await.status(),
            StatusCode::OK
        );
        assert_eq!(
            app.get("/protected", Some(&app.bearer("b"))).await.status(),
            StatusCode::OK
        );
        assert_eq!(
            app.get("/protected", Some(&app.bearer("a"))).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_respect_quota() {
        let app = Arc::new(TestApp::new(10));
        let bearer = app.bearer("burst");

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let app = Arc::clone(&app);
                let bearer = bearer.clone();
                tokio::spawn(async move { app.get("/protected", Some(&bearer)).await.status() })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap() == StatusCode::OK {
                ok += 1;
            }
        }

        assert_eq!(ok, 10);
        assert_eq!(app.counter(names::RATE_LIMITED), 30);
        assert_eq!(app.sink.len(), 40);
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_protected_response_carries_headers() {
        let app = TestApp::new(5);

        let response = app.get("/protected", Some(&app.bearer("u1"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let correlation = response.headers()[headers::CORRELATION_ID].to_str().unwrap();
        assert!(!correlation.is_empty());

        let elapsed: u64 = response.headers()[headers::PROCESS_TIME]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(elapsed < 60_000);

        let records = app.sink.records();
        assert_eq!(records[0].correlation_id.to_string(), correlation);
    }

    #[tokio::test]
    async fn test_panicking_handler_returns_generic_500() {
        let app = TestApp::new(5);
        let router = with_pipeline(
            Router::new().route(
                "/",
                get(|| async {
                    if true {
                        panic!("password=hunter2");
                    }
                    "unreachable"
                }),
            ),
            Arc::clone(&app.state.pipeline),
        );

        let response = router
            .oneshot(build(Method::GET, "/", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key(headers::CORRELATION_ID));
        let body = json_body(response).await;
        assert_eq!(body, serde_json::json!({"detail": "Internal server error"}));

        assert_eq!(app.counter(names::SUCCESS), 0);
        assert_eq!(app.counter(names::SERVER_ERROR), 1);

        let records = app.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, 500);
        assert!(records[0].error.as_deref().unwrap().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_one_record_and_one_outcome_per_request() {
        let app = TestApp::new(1);
        let bearer = app.bearer("u1");

        app.get("/", None).await;
        app.get("/protected", None).await;
        app.get("/protected", Some("Bearer bad")).await;
        app.get("/protected", Some(&bearer)).await;
        app.get("/protected", Some(&bearer)).await;

        assert_eq!(app.sink.len(), 5);
        assert_eq!(app.counter(names::TOTAL_REQUESTS), 5);

        let outcomes = app.counter(names::SUCCESS)
            + app.counter(names::UNAUTHORIZED)
            + app.counter(names::RATE_LIMITED)
            + app.counter(names::SERVER_ERROR);
        assert_eq!(outcomes, 5);

        let outcomes: Vec<_> = app.sink.records().iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AccessOutcome::Success,
                AccessOutcome::Unauthorized,
                AccessOutcome::Unauthorized,
                AccessOutcome::Success,
                AccessOutcome::RateLimited,
            ]
        );
    }

    #[tokio::test]
    async fn test_metrics_snapshot_endpoint() {
        let app = TestApp::new(5);
        app.get("/protected", None).await;

        let json = json_body(app.get("/metrics", None).await).await;
        assert_eq!(json["total_requests"], 2);
        assert_eq!(json["unauthorized"], 1);
        // The snapshot is taken before this request's own outcome is counted.
        assert!(json.get("success").is_none());
    }

    #[tokio::test]
    async fn test_prometheus_endpoint() {
        let app = TestApp::new(5);
        app.get("/protected", None).await;

        let response = app.get("/metrics/prometheus", None).await;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("gateway_requests_total{counter=\"unauthorized\"} 1"));
    }
}
