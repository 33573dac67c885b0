//! Error taxonomy for requests rejected or failed by the gateway pipeline.
//!
//! Every variant is converted into a response at the pipeline boundary; none
//! propagates to the transport layer.

use http::StatusCode;
use std::time::Duration;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Terminal failures of the request pipeline
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No `Authorization` header on a protected path
    #[error("Missing credential")]
    MissingCredential,

    /// Credential failed signature, format or expiry validation
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Rate limiter denied admission
    #[error("Quota exceeded, retry after {}s", retry_after.as_secs())]
    QuotaExceeded {
        /// Time until the oldest admitted request leaves the window
        retry_after: Duration,
    },

    /// The downstream handler failed unexpectedly
    #[error("Downstream failure: {0}")]
    DownstreamFailure(String),
}

impl GatewayError {
    /// Create an invalid credential error
    pub fn invalid_credential(reason: impl Into<String>) -> Self {
        Self::InvalidCredential(reason.into())
    }

    /// Create a downstream failure error
    pub fn downstream(detail: impl Into<String>) -> Self {
        Self::DownstreamFailure(detail.into())
    }

    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DownstreamFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, carried in logs and access records
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential(_) => "invalid_credential",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::DownstreamFailure(_) => "downstream_failure",
        }
    }

    /// Message returned to the caller. Never contains internal detail.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingCredential => "Not authenticated",
            Self::InvalidCredential(_) => "Invalid or expired token",
            Self::QuotaExceeded { .. } => "Rate limit exceeded",
            Self::DownstreamFailure(_) => "Internal server error",
        }
    }
}
