//! # Gateway Server
//!
//! HTTP server implementation for the API gateway.
//!
//! This crate provides:
//! - Bearer token verification and issuance
//! - The request pipeline (authentication, rate limiting, metrics, access logging)
//! - Axum handlers, routes and shared state
//! - Server bootstrap with graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use auth::{
    extract_bearer, Claims, CredentialVerifier, IssuedToken, PublicPaths, TokenError,
    TokenIssuer, TokenVerifier,
};
pub use error::{ApiError, DownstreamFault, ErrorBody};
pub use pipeline::{pipeline_middleware, GatewayPipeline, Outcome};
pub use routes::{create_router, with_pipeline};
pub use server::{Server, ServerConfig, ServerError};
pub use shutdown::shutdown_signal;
pub use state::{AppState, AppStateBuilder};
