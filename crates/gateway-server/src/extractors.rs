//! Custom Axum extractors for the gateway.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use gateway_core::{CallerIdentity, CorrelationId};

use crate::error::ApiError;

/// Verified caller attached by the pipeline
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only reachable when a handler needing a caller is mounted on a public path.
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                ApiError::internal(format!(
                    "no verified caller on {}; route is not protected",
                    parts.uri.path()
                ))
            })
    }
}

/// Correlation ID assigned by the pipeline
#[derive(Debug, Clone, Copy)]
pub struct RequestCorrelation(pub CorrelationId);

#[async_trait]
impl<S> FromRequestParts<S> for RequestCorrelation
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CorrelationId>()
            .copied()
            .map(Self)
            .ok_or_else(|| ApiError::internal("request did not pass through the pipeline"))
    }
}
