//! Validated domain newtypes used across the gateway.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Header names the gateway reads or writes.
pub mod headers {
    /// Correlation ID attached to every response
    pub const CORRELATION_ID: &str = "x-correlation-id";
    /// Processing time in whole milliseconds
    pub const PROCESS_TIME: &str = "x-process-time";
    /// Per-window request quota
    pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
    /// Requests left in the current window
    pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
}

/// Identity of a verified caller, taken from the credential's subject claim.
///
/// The gateway treats it as an opaque key for rate limiting and log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    /// Create a caller identity from a subject string
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    /// Get the identity as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CallerIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Per-request correlation identifier (random 128-bit UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
