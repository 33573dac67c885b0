//! HTTP request handlers for the gateway API.

use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use gateway_core::{CallerIdentity, CorrelationId};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::{
    auth::IssuedToken,
    error::ApiError,
    extractors::{Caller, RequestCorrelation},
    state::AppState,
};

/// Simple message body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Message text
    pub message: &'static str,
}

/// Root endpoint
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "API Gateway running",
    })
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime_seconds: u64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// Issue a token for the configured demo subject
pub async fn login(State(state): State<AppState>) -> Result<Json<IssuedToken>, ApiError> {
    let subject = &state.config.auth.demo_subject;
    let issued = state.issuer.issue(subject)?;

    info!(subject = %subject, expires_in = issued.expires_in, "Issued token");

    Ok(Json(issued))
}

/// Protected resource response
#[derive(Debug, Serialize)]
pub struct ProtectedResponse {
    /// Message text
    pub message: &'static str,
    /// Verified caller
    pub caller: CallerIdentity,
    /// Correlation ID of this request
    pub correlation_id: CorrelationId,
}

/// Placeholder protected resource
pub async fn protected(
    Caller(caller): Caller,
    RequestCorrelation(correlation_id): RequestCorrelation,
) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "You accessed a protected API",
        caller,
        correlation_id,
    })
}

/// JSON 404 for unmatched paths
pub async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}

/// Counter snapshot
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<BTreeMap<String, u64>> {
    Json(state.metrics.snapshot())
}

/// Metrics endpoint (Prometheus format)
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.gather(),
    )
}

/// OpenAPI document
pub async fn openapi() -> Json<Value> {
    Json(openapi_document())
}

/// Documentation page
pub async fn docs() -> Html<&'static str> {
    Html(DOCS_PAGE)
}

const DOCS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>API Gateway</title></head>
<body>
<h1>API Gateway</h1>
<p>The OpenAPI description is served at <a href="/openapi.json">/openapi.json</a>.</p>
<p>Obtain a token with <code>POST /login</code> and send it as
<code>Authorization: Bearer &lt;token&gt;</code>.</p>
</body>
</html>
"#;

fn openapi_document() -> Value {
    let detail = json!({
        "type": "object",
        "properties": { "detail": { "type": "string" } }
    });

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "API Gateway",
            "version": env!("CARGO_PKG_VERSION")
        },
        "components": {
            "securitySchemes": {
                "bearer": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            },
            "schemas": { "Error": detail }
        },
        "paths": {
            "/": { "get": { "summary": "Service banner", "responses": { "200": { "description": "Running" } } } },
            "/health": { "get": { "summary": "Health check", "responses": { "200": { "description": "Healthy" } } } },
            "/login": { "post": { "summary": "Issue a bearer token", "responses": { "200": { "description": "Token issued" } } } },
            "/protected": {
                "get": {
                    "summary": "Protected resource",
                    "security": [ { "bearer": [] } ],
                    "responses": {
                        "200": { "description": "Caller is authenticated" },
                        "401": { "description": "Not authenticated or invalid token" },
                        "429": { "description": "Rate limit exceeded" }
                    }
                }
            },
            "/metrics": { "get": { "summary": "Counter snapshot", "responses": { "200": { "description": "Counters" } } } },
            "/metrics/prometheus": { "get": { "summary": "Prometheus exposition", "responses": { "200": { "description": "Metrics" } } } }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_protected_route() {
        let doc = openapi_document();
        assert_eq!(doc["openapi"], "3.0.3");
        assert!(doc["paths"]["/protected"]["get"]["security"].is_array());
    }

    #[tokio::test]
    async fn test_root_message() {
        let Json(body) = root().await;
        assert_eq!(body.message, "API Gateway running");
    }
}
