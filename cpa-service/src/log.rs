//! Audit log entries for field mutations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

/// A log entry recording one field mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique ID for this log entry (ULID format)
    pub id: String,

    /// When the operation occurred
    pub timestamp: DateTime<Utc>,

    /// Canonical op string (e.g., "create field", "delete field")
    pub op: String,

    /// The request as JSON
    pub input: Value,

    /// The stored field, or `{"error": ...}` on failure
    pub output: Value,

    /// Who performed the operation, e.g. "user:abc" or "local"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// How long the operation took (milliseconds)
    pub duration_ms: u64,
}

impl LogEntry {
    pub fn new(
        op: impl Into<String>,
        input: Value,
        output: Value,
        actor: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            timestamp: Utc::now(),
            op: op.into(),
            input,
            output,
            actor,
            duration_ms,
        }
    }

    /// Whether the logged operation failed.
    pub fn is_error(&self) -> bool {
        self.output.get("error").is_some()
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn record(&self, entry: LogEntry);
}

/// Emits each entry as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

#[async_trait]
impl LogSink for TracingLogSink {
    async fn record(&self, entry: LogEntry) {
        info!(
            op = %entry.op,
            actor = entry.actor.as_deref().unwrap_or("-"),
            duration_ms = entry.duration_ms,
            failed = entry.is_error(),
            "field audit"
        );
    }
}

/// Keeps entries in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn record(&self, entry: LogEntry) {
        self.entries.lock().await.push(entry);
    }
}
