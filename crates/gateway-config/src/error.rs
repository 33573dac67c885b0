//! Configuration errors.

use std::path::PathBuf;

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// File extension is not yaml, yml, toml or json
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    /// YAML parse error
    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parse error
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parse error
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Environment override could not be parsed
    #[error("Invalid value for {var}: {message}")]
    Env {
        /// Variable name
        var: &'static str,
        /// Parse failure
        message: String,
    },

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}
