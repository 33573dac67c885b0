//! Request counters.
//!
//! Counters are created at zero on first increment and only ever grow. All
//! counters sit behind one lock, so a snapshot is a consistent copy that no
//! later increment can change. Every increment is mirrored into a Prometheus
//! registry for scraping.

use parking_lot::Mutex;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::warn;

/// Counter names produced by the gateway pipeline
pub mod names {
    /// Every inbound request
    pub const TOTAL_REQUESTS: &str = "total_requests";
    /// Requests whose downstream handler completed
    pub const SUCCESS: &str = "success";
    /// Requests rejected for a missing or invalid credential
    pub const UNAUTHORIZED: &str = "unauthorized";
    /// Requests rejected by the rate limiter
    pub const RATE_LIMITED: &str = "rate_limited";
    /// Requests whose downstream handler failed
    pub const SERVER_ERROR: &str = "server_error";
}

/// Metrics setup error
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Prometheus registration failed
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
}

/// Process-wide named counters
pub struct MetricsRegistry {
    counters: Mutex<HashMap<String, u64>>,
    registry: Registry,
    requests: IntCounterVec,
    latency: Histogram,
}

impl MetricsRegistry {
    /// Create an empty registry
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Gateway request counters by name"),
            &["counter"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let latency = Histogram::with_opts(
            HistogramOpts::new(
                "gateway_request_duration_seconds",
                "End-to-end pipeline latency",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            counters: Mutex::new(HashMap::new()),
            registry,
            requests,
            latency,
        })
    }

    /// Add one to a counter, creating it at zero if absent
    pub fn increment(&self, name: &str) {
        {
            let mut counters = self.counters.lock();
            *counters.entry(name.to_string()).or_insert(0) += 1;
        }
        self.requests.with_label_values(&[name]).inc();
    }

    /// Current value of a counter (zero if never incremented)
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Point-in-time copy of every counter
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        let counters = self.counters.lock();
        counters.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Record end-to-end request latency
    pub fn observe_latency(&self, latency: Duration) {
        self.latency.observe(latency.as_secs_f64());
    }

    /// Render all metrics in the Prometheus text format
    #[must_use]
    pub fn gather(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("counters", &self.snapshot())
            .finish_non_exhaustive()
    }
}
