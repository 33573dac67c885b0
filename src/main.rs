//! # API Gateway
//!
//! Single ingress point that authenticates callers with bearer tokens,
//! enforces a per-caller sliding-window quota, counts outcomes and writes
//! one structured access log record per request.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! api-gateway
//!
//! # Start with a config file
//! GATEWAY_CONFIG=/path/to/gateway.yaml api-gateway
//!
//! # Start with environment overrides
//! GATEWAY_PORT=9000 GATEWAY_JWT_SECRET=change-me api-gateway
//! ```

use anyhow::Context;
use gateway_config::{load_config, GatewayConfig};
use gateway_server::{AppState, Server, ServerConfig};
use gateway_telemetry::{init_logging, AccessLogger, FileSink, LoggingConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Time allowed for queued access log records to reach the file on exit
const ACCESS_LOG_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Application entry point
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()
        .await
        .context("Failed to load configuration")?;

    init_logging(
        &LoggingConfig::new()
            .with_level(config.logging.level.clone())
            .with_format(config.logging.format),
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting API gateway"
    );

    run(config).await
}

/// Main application logic
async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    if config.uses_dev_secret() {
        warn!("Using the built-in development signing secret; set GATEWAY_JWT_SECRET");
    }

    info!(
        host = %config.server.host,
        port = config.server.port,
        window_secs = config.rate_limit.window.as_secs(),
        max_requests = config.rate_limit.max_requests,
        public_paths = config.auth.public_paths.len(),
        "Configuration loaded"
    );

    let (access_logger, access_log_writer) = create_access_logger(&config).await?;
    let server_config = ServerConfig::from_settings(&config.server);

    let state = AppState::builder()
        .config(config)
        .access_logger(access_logger)
        .build()
        .context("Failed to initialize metrics")?;

    Server::new(server_config, state).run().await?;

    if let Some(writer) = access_log_writer {
        if tokio::time::timeout(ACCESS_LOG_FLUSH_TIMEOUT, writer)
            .await
            .is_err()
        {
            warn!("Access log writer did not finish before exit");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Access log sink selected by configuration, plus the file writer task if any
async fn create_access_logger(
    config: &GatewayConfig,
) -> anyhow::Result<(AccessLogger, Option<JoinHandle<()>>)> {
    match &config.logging.access_log_path {
        Some(path) => {
            let (sink, writer) = FileSink::open(path)
                .await
                .with_context(|| format!("Failed to open access log {}", path.display()))?;
            info!(path = %path.display(), "Writing access log to file");
            Ok((AccessLogger::new(Arc::new(sink)), Some(writer)))
        }
        None => Ok((AccessLogger::tracing(), None)),
    }
}
