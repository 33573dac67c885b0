//! Shared application state.

use gateway_config::GatewayConfig;
use gateway_resilience::{RateLimiter, SlidingWindowLimiter};
use gateway_telemetry::{AccessLogger, MetricsError, MetricsRegistry};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{CredentialVerifier, PublicPaths, TokenIssuer, TokenVerifier};
use crate::pipeline::GatewayPipeline;

/// State available to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<GatewayConfig>,
    /// Request pipeline
    pub pipeline: Arc<GatewayPipeline>,
    /// Token issuer for the login endpoint
    pub issuer: Arc<TokenIssuer>,
    /// Traffic counters
    pub metrics: Arc<MetricsRegistry>,
    /// Process start
    pub started_at: Instant,
}

impl AppState {
    /// Create a builder
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }
}

/// Builder for [`AppState`]. Unset collaborators are derived from the configuration.
#[derive(Debug, Default)]
pub struct AppStateBuilder {
    config: Option<GatewayConfig>,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    metrics: Option<Arc<MetricsRegistry>>,
    access_logger: Option<AccessLogger>,
}

impl AppStateBuilder {
    /// Set configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the credential verifier
    #[must_use]
    pub fn verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Replace the rate limiter
    #[must_use]
    pub fn limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Use an existing metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the access logger
    #[must_use]
    pub fn access_logger(mut self, logger: AccessLogger) -> Self {
        self.access_logger = Some(logger);
        self
    }

    /// Build the state
    pub fn build(self) -> Result<AppState, MetricsError> {
        let config = self.config.unwrap_or_default();

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(MetricsRegistry::new()?),
        };
        let verifier = self
            .verifier
            .unwrap_or_else(|| Arc::new(TokenVerifier::from_settings(&config.auth)));
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(SlidingWindowLimiter::new(config.rate_limit)));

        let pipeline = GatewayPipeline::new(
            verifier,
            limiter,
            Arc::clone(&metrics),
            self.access_logger.unwrap_or_default(),
            PublicPaths::new(config.auth.public_paths.clone()),
        );

        Ok(AppState {
            issuer: Arc::new(TokenIssuer::from_settings(&config.auth)),
            pipeline: Arc::new(pipeline),
            metrics,
            config: Arc::new(config),
            started_at: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::RouteClass;

    #[test]
    fn test_build_from_defaults() {
        let state = AppState::builder().build().unwrap();

        assert_eq!(state.config.server.port, 8000);
        assert_eq!(state.pipeline.classify("/login"), RouteClass::Public);
        assert_eq!(state.pipeline.classify("/protected"), RouteClass::Protected);
        assert!(Arc::ptr_eq(&state.metrics, state.pipeline.metrics()));
    }

    #[test]
    fn test_custom_public_paths() {
        let mut config = GatewayConfig::default();
        config.auth.public_paths = vec!["/open/*".to_string()];

        let state = AppState::builder().config(config).build().unwrap();

        assert_eq!(state.pipeline.classify("/open/anything"), RouteClass::Public);
        assert_eq!(state.pipeline.classify("/login"), RouteClass::Protected);
    }
}
