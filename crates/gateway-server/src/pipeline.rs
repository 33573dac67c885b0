//! # Gateway Pipeline
//!
//! Runs every inbound request through:
//!
//! 1. correlation ID, start time and `total_requests`
//! 2. route classification against the public allowlist
//! 3. for protected routes: credential verification, then rate limiting
//! 4. the downstream handler, with panics and 5xx faults caught
//! 5. a single finalize step that maps the [`Outcome`] to the response,
//!    the outcome counter, the response headers and one access log record
//!
//! Rate limiting runs only after a successful verification, so quota is
//! always charged against a verified identity.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use futures::FutureExt;
use gateway_core::{
    context::round_millis, headers, CallerIdentity, GatewayError, GatewayResult, RequestContext,
    RouteClass,
};
use gateway_resilience::{RateDecision, RateLimiter};
use gateway_telemetry::{names, AccessLogRecord, AccessLogger, AccessOutcome, MetricsRegistry};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::auth::{extract_bearer, CredentialVerifier, PublicPaths};
use crate::error::{DownstreamFault, ErrorBody};

/// Terminal result of the pre-finalize stages
pub enum Outcome {
    /// The downstream handler produced a response
    Success {
        /// Handler response
        response: Response,
        /// Limiter decision for protected routes
        quota: Option<RateDecision>,
    },
    /// Missing or invalid credential
    AuthRejected(GatewayError),
    /// Quota exhausted
    RateLimited(RateDecision),
    /// The downstream handler panicked or reported a server fault
    InternalError(String),
}

/// Request pipeline shared by all connections
#[derive(Debug)]
pub struct GatewayPipeline {
    verifier: Arc<dyn CredentialVerifier>,
    limiter: Arc<dyn RateLimiter>,
    metrics: Arc<MetricsRegistry>,
    access_log: AccessLogger,
    public_paths: PublicPaths,
}

impl GatewayPipeline {
    /// Create a pipeline from its collaborators
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        limiter: Arc<dyn RateLimiter>,
        metrics: Arc<MetricsRegistry>,
        access_log: AccessLogger,
        public_paths: PublicPaths,
    ) -> Self {
        Self {
            verifier,
            limiter,
            metrics,
            access_log,
            public_paths,
        }
    }

    /// Metrics registry
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Classify a request path
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.public_paths.is_public(path) {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }

    /// Run a request through the pipeline around `downstream`
    pub async fn handle<F, Fut>(&self, request: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let mut ctx = RequestContext::start(self.classify(&path));

        self.metrics.increment(names::TOTAL_REQUESTS);

        let outcome = self.dispatch(&mut ctx, request, downstream).await;
        self.finalize(&ctx, method, path, outcome)
    }

    async fn dispatch<F, Fut>(
        &self,
        ctx: &mut RequestContext,
        mut request: Request,
        downstream: F,
    ) -> Outcome
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let mut quota = None;

        if ctx.route == RouteClass::Protected {
            let caller = match self.authenticate(request.headers()) {
                Ok(caller) => caller,
                Err(err) => return Outcome::AuthRejected(err),
            };
            ctx.set_caller(caller.clone());

            let decision = self.limiter.check(&caller);
            if !decision.allowed {
                return Outcome::RateLimited(decision);
            }
            quota = Some(decision);

            request.extensions_mut().insert(caller);
        }

        request.extensions_mut().insert(ctx.correlation_id);

        match AssertUnwindSafe(downstream(request)).catch_unwind().await {
            Ok(response) => match response.extensions().get::<DownstreamFault>() {
                Some(fault) => Outcome::InternalError(fault.0.clone()),
                None => Outcome::Success { response, quota },
            },
            Err(panic) => Outcome::InternalError(panic_detail(panic.as_ref())),
        }
    }

    fn authenticate(&self, headers: &HeaderMap) -> GatewayResult<CallerIdentity> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(GatewayError::MissingCredential)?;

        let value = value
            .to_str()
            .map_err(|_| GatewayError::invalid_credential("authorization header is not ASCII"))?;

        self.verifier.verify(extract_bearer(value))
    }

    fn finalize(
        &self,
        ctx: &RequestContext,
        method: String,
        path: String,
        outcome: Outcome,
    ) -> Response {
        let (mut response, counter, access_outcome, failure) = match outcome {
            Outcome::Success {
                mut response,
                quota,
            } => {
                if let Some(decision) = quota {
                    set_quota_headers(response.headers_mut(), &decision);
                }
                (response, names::SUCCESS, AccessOutcome::Success, None)
            }
            Outcome::AuthRejected(err) => {
                debug!(
                    correlation_id = %ctx.correlation_id,
                    path = %path,
                    error_code = err.error_code(),
                    error = %err,
                    "Authentication failed"
                );
                let mut response = ErrorBody::response(err.status_code(), err.public_message());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                (
                    response,
                    names::UNAUTHORIZED,
                    AccessOutcome::Unauthorized,
                    Some(err),
                )
            }
            Outcome::RateLimited(decision) => {
                let err = GatewayError::QuotaExceeded {
                    retry_after: decision.retry_after,
                };
                let mut response = ErrorBody::response(err.status_code(), err.public_message());
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_after_secs(decision.retry_after)),
                );
                set_quota_headers(response.headers_mut(), &decision);
                (
                    response,
                    names::RATE_LIMITED,
                    AccessOutcome::RateLimited,
                    Some(err),
                )
            }
            Outcome::InternalError(detail) => {
                let err = GatewayError::downstream(detail);
                error!(
                    correlation_id = %ctx.correlation_id,
                    path = %path,
                    error_code = err.error_code(),
                    error = %err,
                    "Downstream handler failed"
                );
                (
                    ErrorBody::response(err.status_code(), err.public_message()),
                    names::SERVER_ERROR,
                    AccessOutcome::ServerError,
                    Some(err),
                )
            }
        };

        self.metrics.increment(counter);

        let elapsed = ctx.elapsed();
        let latency_ms = round_millis(elapsed);
        self.metrics.observe_latency(elapsed);

        let out = response.headers_mut();
        out.insert(headers::PROCESS_TIME, HeaderValue::from(latency_ms));
        match HeaderValue::from_str(&ctx.correlation_id.to_string()) {
            Ok(value) => {
                out.insert(headers::CORRELATION_ID, value);
            }
            Err(e) => warn!(error = %e, "Correlation ID is not a valid header value"),
        }

        self.access_log.record(&AccessLogRecord {
            timestamp: Utc::now(),
            correlation_id: ctx.correlation_id,
            method,
            path,
            caller: ctx.caller.clone(),
            status: response.status().as_u16(),
            latency_ms,
            outcome: access_outcome,
            error_code: failure.as_ref().map(|err| err.error_code().to_string()),
            error: failure.map(|err| err.to_string()),
        });

        response
    }
}

/// Axum middleware running the shared pipeline around the rest of the stack
pub async fn pipeline_middleware(
    State(pipeline): State<Arc<GatewayPipeline>>,
    request: Request,
    next: Next,
) -> Response {
    pipeline.handle(request, |request| next.run(request)).await
}

fn set_quota_headers(map: &mut HeaderMap, decision: &RateDecision) {
    map.insert(headers::RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    map.insert(
        headers::RATE_LIMIT_REMAINING,
        HeaderValue::from(decision.remaining),
    );
}

/// Whole seconds, rounded up, never below one
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after
        .as_secs()
        .saturating_add(u64::from(retry_after.subsec_nanos() > 0));
    secs.max(1)
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
