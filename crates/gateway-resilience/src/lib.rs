//! # Gateway Resilience
//!
//! Admission control for the API gateway:
//! - Exact sliding-window rate limiting keyed by caller identity
//! - Per-identity exclusion so callers never contend with each other

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod rate_limiter;

// Re-export main types
pub use rate_limiter::{
    RateDecision, RateLimitConfig, RateLimiter, SlidingWindowLimiter, SWEEP_INTERVAL,
};
