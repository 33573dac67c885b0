//! HTTP server bootstrap.

use gateway_config::ServerSettings;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::{routes::create_router, shutdown::shutdown_signal, state::AppState};

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Serving failed
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Drain time allowed after a shutdown signal
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Build from loaded settings
    #[must_use]
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            shutdown_timeout: settings.shutdown_timeout,
        }
    }

    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// HTTP server
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a server
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            shutdown_signal().await;
        })
        .await
    }

    /// Bind and serve until `signal` resolves, then drain for at most the shutdown timeout
    pub async fn run_until<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let local = listener.local_addr()?;
        info!(address = %local, "Gateway listening");

        self.serve(listener, signal).await
    }

    async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state);

        let stopping = Arc::new(Notify::new());
        let trigger = Arc::clone(&stopping);

        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            signal.await;
            trigger.notify_one();
        });

        let timeout = self.config.shutdown_timeout;

        tokio::select! {
            result = server.into_future() => {
                result?;
                info!("Gateway stopped");
            }
            () = async {
                stopping.notified().await;
                tokio::time::sleep(timeout).await;
            } => {
                warn!(timeout_secs = timeout.as_secs(), "Graceful shutdown timed out; dropping open connections");
            }
        }

        Ok(())
    }
}
