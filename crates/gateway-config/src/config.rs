//! Typed gateway configuration.

use gateway_resilience::RateLimitConfig;
use gateway_telemetry::LogFormat;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Signing secret used when none is configured
pub const DEV_SECRET: &str = "dev-secret-key";

/// Root configuration
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings
    #[validate(nested)]
    pub server: ServerSettings,
    /// Credential settings
    #[validate(nested)]
    pub auth: AuthSettings,
    /// Rate limiter settings
    #[validate(custom(function = "validate_rate_limit"))]
    pub rate_limit: RateLimitConfig,
    /// Logging settings
    #[validate(nested)]
    pub logging: LoggingSettings,
}

impl GatewayConfig {
    /// Whether the built-in development secret is in use
    #[must_use]
    pub fn uses_dev_secret(&self) -> bool {
        self.auth.secret.expose_secret() == DEV_SECRET
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    #[validate(length(min = 1))]
    pub host: String,
    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,
    /// Time allowed for in-flight requests to drain on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Token signing algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum JwtAlgorithm {
    /// HMAC with SHA-256
    #[default]
    HS256,
    /// HMAC with SHA-384
    HS384,
    /// HMAC with SHA-512
    HS512,
}

impl FromStr for JwtAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(format!("unsupported algorithm: {other}")),
        }
    }
}

/// Credential verification and issuance settings
#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_auth"))]
pub struct AuthSettings {
    /// Shared signing secret
    pub secret: SecretString,
    /// Signing algorithm
    pub algorithm: JwtAlgorithm,
    /// Lifetime of issued tokens
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "validate_non_zero"))]
    pub token_ttl: Duration,
    /// Subject placed in tokens issued by the login endpoint
    #[validate(length(min = 1))]
    pub demo_subject: String,
    /// Paths exempt from authentication and rate limiting
    pub public_paths: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret: SecretString::new(DEV_SECRET.to_string()),
            algorithm: JwtAlgorithm::default(),
            token_ttl: Duration::from_secs(2 * 60 * 60),
            demo_subject: "user123".to_string(),
            public_paths: default_public_paths(),
        }
    }
}

/// Default public path allowlist
#[must_use]
pub fn default_public_paths() -> Vec<String> {
    [
        "/",
        "/health",
        "/login",
        "/docs",
        "/openapi.json",
        "/metrics",
        "/metrics/prometheus",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level filter
    #[validate(length(min = 1))]
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Newline-delimited JSON access log file; `None` logs via `tracing`
    pub access_log_path: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            access_log_path: None,
        }
    }
}

// `SecretString` is not `Serialize`, so the secret is checked at struct level.
fn validate_auth(auth: &AuthSettings) -> Result<(), ValidationError> {
    if auth.secret.expose_secret().is_empty() {
        return Err(ValidationError::new("empty_secret"));
    }
    Ok(())
}

fn validate_non_zero(duration: &Duration) -> Result<(), ValidationError> {
    if duration.is_zero() {
        return Err(ValidationError::new("zero_duration"));
    }
    Ok(())
}

fn validate_rate_limit(config: &RateLimitConfig) -> Result<(), ValidationError> {
    if config.window.is_zero() {
        return Err(ValidationError::new("zero_window"));
    }
    if config.max_requests == 0 {
        return Err(ValidationError::new("zero_max_requests"));
    }
    Ok(())
}
