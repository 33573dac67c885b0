//! Route definitions for the gateway API.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{
    handlers,
    pipeline::{pipeline_middleware, GatewayPipeline},
    state::AppState,
};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let pipeline = Arc::clone(&state.pipeline);

    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/login", post(handlers::login))
        .route("/protected", get(handlers::protected))
        // Metrics endpoints
        .route("/metrics", get(handlers::metrics_snapshot))
        .route("/metrics/prometheus", get(handlers::prometheus_metrics))
        // Documentation
        .route("/openapi.json", get(handlers::openapi))
        .route("/docs", get(handlers::docs))
        .fallback(handlers::not_found)
        .with_state(state);

    with_pipeline(router, pipeline).layer(TraceLayer::new_for_http())
}

/// Wrap every route of `router`, including its fallback, in the gateway pipeline
pub fn with_pipeline<S>(router: Router<S>, pipeline: Arc<GatewayPipeline>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(pipeline, pipeline_middleware))
}
