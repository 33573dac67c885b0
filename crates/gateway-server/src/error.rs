//! Handler error type.
//!
//! Handlers and extractors return [`ApiError`]. Client errors are rendered as
//! `{"detail": ...}` with their own message. Server errors are rendered with
//! a generic message and tag the response with a [`DownstreamFault`] so the
//! pipeline records the failure and logs the real detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Body of every error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub detail: String,
}

impl ErrorBody {
    /// Build an error response with the given status and message
    pub fn response(status: StatusCode, detail: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                detail: detail.into(),
            }),
        )
            .into_response()
    }
}

/// Response extension marking a downstream failure. Holds internal detail.
#[derive(Debug, Clone)]
pub struct DownstreamFault(pub String);

/// API error returned by handlers
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Create an error with an explicit status
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 500 Internal Server Error; the message is never sent to the client
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// HTTP status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let mut response = ErrorBody::response(self.status, "Internal server error");
            response
                .extensions_mut()
                .insert(DownstreamFault(self.message));
            return response;
        }
        ErrorBody::response(self.status, self.message)
    }
}

impl From<crate::auth::TokenError> for ApiError {
    fn from(err: crate::auth::TokenError) -> Self {
        Self::internal(err.to_string())
    }
}
