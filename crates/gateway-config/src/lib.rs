//! # Gateway Config
//!
//! Typed configuration for the API gateway. Values come from built-in
//! defaults, an optional YAML/TOML/JSON file and `GATEWAY_*` environment
//! variables, in that order, and are validated before use.

pub mod config;
pub mod error;
pub mod loader;

pub use config::{
    default_public_paths, AuthSettings, GatewayConfig, JwtAlgorithm, LoggingSettings,
    ServerSettings, DEV_SECRET,
};
pub use error::ConfigError;
pub use loader::{load_config, ConfigLoader, CONFIG_PATH_ENV};
