//! # Gateway Core
//!
//! Core types shared by every layer of the API gateway.
//!
//! This crate provides:
//! - Caller identity and correlation ID newtypes
//! - Per-request context and route classification
//! - The pipeline error taxonomy
//! - A clock abstraction so time-dependent components can be tested

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod context;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use context::{RequestContext, RouteClass};
pub use error::{GatewayError, GatewayResult};
pub use types::{headers, CallerIdentity, CorrelationId};
