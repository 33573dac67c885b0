//! # Gateway Telemetry
//!
//! Observability for the API gateway.
//!
//! This crate provides:
//! - Named request counters with point-in-time snapshots
//! - Prometheus exposition of the same counters plus request latency
//! - One structured access-log record per request, written to a pluggable sink
//! - Process logging setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access_log;
pub mod logging;
pub mod metrics;

// Re-export main types
pub use access_log::{
    AccessLogError, AccessLogRecord, AccessLogSink, AccessLogger, AccessOutcome, FileSink,
    MemorySink, TracingSink,
};
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use metrics::{names, MetricsError, MetricsRegistry};
