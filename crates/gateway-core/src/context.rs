//! Per-request scratch state carried through the pipeline.

use crate::types::{CallerIdentity, CorrelationId};
use serde::Serialize;
use std::time::{Duration, Instant};

/// How the pipeline treats a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Allowlisted; skips authentication and rate limiting
    Public,
    /// Requires a verified credential and quota
    Protected,
}

/// Request context created at pipeline entry and dropped once the response is finalized.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation ID for logs and response headers
    pub correlation_id: CorrelationId,
    /// Pipeline entry time
    pub started_at: Instant,
    /// Route classification
    pub route: RouteClass,
    /// Verified caller, if authentication ran and succeeded
    pub caller: Option<CallerIdentity>,
}

impl RequestContext {
    /// Start a new context with a fresh correlation ID
    #[must_use]
    pub fn start(route: RouteClass) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            started_at: Instant::now(),
            route,
            caller: None,
        }
    }

    /// Attach the verified caller
    pub fn set_caller(&mut self, caller: CallerIdentity) {
        self.caller = Some(caller);
    }

    /// Time elapsed since the context was started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Round a duration to whole milliseconds
#[must_use]
pub fn round_millis(duration: Duration) -> u64 {
    (duration.as_secs_f64() * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_starts_anonymous() {
        let ctx = RequestContext::start(RouteClass::Protected);
        assert!(ctx.caller.is_none());
        assert_eq!(ctx.route, RouteClass::Protected);
    }

    #[test]
    fn test_set_caller() {
        let mut ctx = RequestContext::start(RouteClass::Protected);
        ctx.set_caller(CallerIdentity::new("u1"));
        assert_eq!(ctx.caller.as_ref().map(CallerIdentity::as_str), Some("u1"));
    }

    #[test]
    fn test_round_millis() {
        assert_eq!(round_millis(Duration::from_micros(400)), 0);
        assert_eq!(round_millis(Duration::from_micros(1500)), 2);
        assert_eq!(round_millis(Duration::from_millis(42)), 42);
    }
}
