//! Structured access logging.
//!
//! The pipeline emits exactly one [`AccessLogRecord`] per request. Records
//! are handed to an [`AccessLogSink`]; a failing sink is reported and
//! ignored so logging can never fail a request.

use chrono::{DateTime, Utc};
use gateway_core::{CallerIdentity, CorrelationId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Terminal outcome of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    /// Downstream handler completed
    Success,
    /// Missing or invalid credential
    Unauthorized,
    /// Quota exhausted
    RateLimited,
    /// Downstream handler failed
    ServerError,
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::ServerError => write!(f, "server_error"),
        }
    }
}

/// One completed or rejected request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogRecord {
    /// Time the record was produced
    pub timestamp: DateTime<Utc>,
    /// Request correlation ID
    pub correlation_id: CorrelationId,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Verified caller; absent on public routes and auth rejections
    pub caller: Option<CallerIdentity>,
    /// Response status code
    pub status: u16,
    /// Pipeline latency in milliseconds
    pub latency_ms: u64,
    /// Terminal outcome
    pub outcome: AccessOutcome,
    /// Machine-readable failure code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Internal error detail (never sent to the caller)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Access log write error
#[derive(Debug, thiserror::Error)]
pub enum AccessLogError {
    /// Sink I/O failed
    #[error("Access log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("Access log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The writer task has stopped
    #[error("Access log writer is closed")]
    Closed,
}

/// Destination for access log records.
///
/// Implementations must write each record indivisibly.
pub trait AccessLogSink: Send + Sync + fmt::Debug {
    /// Write one record
    fn write(&self, record: &AccessLogRecord) -> Result<(), AccessLogError>;
}

/// Emits records as `tracing` events on the `access_log` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AccessLogSink for TracingSink {
    fn write(&self, record: &AccessLogRecord) -> Result<(), AccessLogError> {
        info!(
            target: "access_log",
            correlation_id = %record.correlation_id,
            method = %record.method,
            path = %record.path,
            caller = record.caller.as_ref().map(CallerIdentity::as_str),
            status = record.status,
            latency_ms = record.latency_ms,
            outcome = %record.outcome,
            error_code = record.error_code.as_deref(),
            error = record.error.as_deref(),
            "request completed"
        );
        Ok(())
    }
}

/// Newline-delimited JSON file sink.
///
/// Records are serialized on the calling task and queued to a writer task
/// that owns the file, so request tasks never block on file I/O. Lines are
/// written one at a time by that single task, which keeps records whole.
#[derive(Debug, Clone)]
pub struct FileSink {
    lines: mpsc::UnboundedSender<Vec<u8>>,
}

impl FileSink {
    /// Open (or create) `path` in append mode and start its writer task.
    ///
    /// The returned handle resolves once every clone of the sink has been
    /// dropped and the queued records are flushed.
    pub async fn open(path: impl AsRef<Path>) -> Result<(Self, JoinHandle<()>), AccessLogError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        let (lines, queue) = mpsc::unbounded_channel();
        let writer = tokio::spawn(drain(queue, file));

        Ok((Self { lines }, writer))
    }
}

impl AccessLogSink for FileSink {
    fn write(&self, record: &AccessLogRecord) -> Result<(), AccessLogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.lines.send(line).map_err(|_| AccessLogError::Closed)
    }
}

async fn drain<W>(mut queue: mpsc::UnboundedReceiver<Vec<u8>>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = queue.recv().await {
        if let Err(e) = writer.write_all(&line).await {
            warn!(error = %e, "Failed to write access log record");
            continue;
        }
        if let Err(e) = writer.flush().await {
            warn!(error = %e, "Failed to flush access log");
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AccessLogRecord>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far
    #[must_use]
    pub fn records(&self) -> Vec<AccessLogRecord> {
        self.records.lock().clone()
    }

    /// Number of records written
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AccessLogSink for MemorySink {
    fn write(&self, record: &AccessLogRecord) -> Result<(), AccessLogError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Best-effort access logger
#[derive(Debug, Clone)]
pub struct AccessLogger {
    sink: Arc<dyn AccessLogSink>,
}

impl AccessLogger {
    /// Create a logger writing to the given sink
    #[must_use]
    pub fn new(sink: Arc<dyn AccessLogSink>) -> Self {
        Self { sink }
    }

    /// Logger that emits `tracing` events
    #[must_use]
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    /// Emit a record. Sink failures are logged and swallowed.
    pub fn record(&self, record: &AccessLogRecord) {
        if let Err(e) = self.sink.write(record) {
            warn!(
                error = %e,
                correlation_id = %record.correlation_id,
                "Failed to write access log record"
            );
        }
    }
}

impl Default for AccessLogger {
    fn default() -> Self {
        Self::tracing()
    }
}
