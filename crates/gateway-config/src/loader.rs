//! Configuration loading from files and the environment.

use crate::config::{GatewayConfig, JwtAlgorithm};
use crate::error::ConfigError;
use gateway_telemetry::LogFormat;
use humantime_serde::re::humantime;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use validator::Validate;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Builds a [`GatewayConfig`] from an optional file plus `GATEWAY_*` overrides
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a loader that reads only defaults and the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the given YAML, TOML or JSON file
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Take overrides from the given map instead of the process environment
    #[must_use]
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    /// Load, override and validate
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.file {
            Some(path) => read_file(path).await?,
            None => GatewayConfig::default(),
        };

        match &self.env {
            Some(vars) => apply_env_overrides(&mut config, |key| vars.get(key).cloned())?,
            None => apply_env_overrides(&mut config, |key| std::env::var(key).ok())?,
        }

        config.validate()?;
        Ok(config)
    }
}

/// Load configuration from `GATEWAY_CONFIG` (if set) and the environment
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let mut loader = ConfigLoader::new();
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        loader = loader.with_file(path);
    }
    loader.load().await
}

async fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), "Read configuration file");

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&content)?),
        Some("toml") => Ok(toml::from_str(&content)?),
        Some("json") => Ok(serde_json::from_str(&content)?),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        message: e.to_string(),
    })
}

fn parse_duration(var: &'static str, value: &str) -> Result<std::time::Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::Env {
        var,
        message: e.to_string(),
    })
}

fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("GATEWAY_PORT") {
        config.server.port = parse_var("GATEWAY_PORT", &port)?;
    }
    if let Some(secret) = lookup("GATEWAY_JWT_SECRET") {
        config.auth.secret = SecretString::new(secret);
    }
    if let Some(algorithm) = lookup("GATEWAY_JWT_ALGORITHM") {
        config.auth.algorithm = parse_var::<JwtAlgorithm>("GATEWAY_JWT_ALGORITHM", &algorithm)?;
    }
    if let Some(ttl) = lookup("GATEWAY_TOKEN_TTL") {
        config.auth.token_ttl = parse_duration("GATEWAY_TOKEN_TTL", &ttl)?;
    }
    if let Some(window) = lookup("GATEWAY_RATE_LIMIT_WINDOW") {
        config.rate_limit.window = parse_duration("GATEWAY_RATE_LIMIT_WINDOW", &window)?;
    }
    if let Some(max) = lookup("GATEWAY_RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = parse_var("GATEWAY_RATE_LIMIT_MAX_REQUESTS", &max)?;
    }
    if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = lookup("GATEWAY_LOG_FORMAT") {
        config.logging.format = parse_var::<LogFormat>("GATEWAY_LOG_FORMAT", &format)?;
    }
    if let Some(path) = lookup("GATEWAY_ACCESS_LOG") {
        config.logging.access_log_path = Some(PathBuf::from(path));
    }
    Ok(())
}
