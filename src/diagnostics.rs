//! Diagnostic trace output for lock handles.
//!
//! Handles with diagnostics enabled emit one [`TraceEntry`] per notable step
//! (configuration, the batch being sent, row counts, failures). Where those
//! entries go is decided by the injected [`DiagnosticSink`]; the default sink
//! discards them, so no handle writes anywhere unless told to.
//!
//! # Formats
//!
//! - `text`: `dd-mm-YYYY: HH:MM:SS: <operation>: <message>`
//! - `ndjson`: one JSON object per line with `ts`, `actor`, `operation`,
//!   `resource` and `message`

use crate::error::{LockError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Timestamp layout of text trace lines.
pub const TEXT_TIMESTAMP_FORMAT: &str = "%d-%m-%Y: %H:%M:%S";

/// Line format written by file sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TraceFormat {
    #[default]
    Text,
    Ndjson,
}

impl TraceFormat {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "ndjson" => Some(Self::Ndjson),
            _ => None,
        }
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// When the step happened.
    pub ts: DateTime<Utc>,

    /// Who emitted it (`user@HOST`).
    pub actor: String,

    /// The handle operation that emitted it (init/acquire/release/probe/drop).
    pub operation: String,

    /// The lock resource name.
    pub resource: String,

    pub message: String,
}

impl TraceEntry {
    pub fn new(operation: &str, resource: &str, message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            actor: get_actor_string(),
            operation: operation.to_string(),
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Render as a timestamped text line (no trailing newline).
    pub fn to_text_line(&self) -> String {
        format!(
            "{}: {}: {}",
            self.ts.format(TEXT_TIMESTAMP_FORMAT),
            self.operation,
            self.message
        )
    }

    /// Serialize to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| LockError::Io(format!("failed to serialize trace entry: {}", e)))
    }

    pub fn render(&self, format: TraceFormat) -> Result<String> {
        match format {
            TraceFormat::Text => Ok(self.to_text_line()),
            TraceFormat::Ndjson => self.to_ndjson_line(),
        }
    }
}

/// Destination for trace entries.
pub trait DiagnosticSink: Send + Sync {
    /// Append one entry.
    fn append(&self, entry: &TraceEntry) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn append(&self, _entry: &TraceEntry) -> Result<()> {
        Ok(())
    }
}

/// Writes text lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn append(&self, entry: &TraceEntry) -> Result<()> {
        eprintln!("{}", entry.to_text_line());
        Ok(())
    }
}

/// Keeps text lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn append(&self, entry: &TraceEntry) -> Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(entry.to_text_line());
        Ok(())
    }
}

/// Appends lines to a file, creating it (and its directory) on first write.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    format: TraceFormat,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, format: TraceFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> TraceFormat {
        self.format
    }
}

impl DiagnosticSink for FileSink {
    fn append(&self, entry: &TraceEntry) -> Result<()> {
        let line = entry.render(self.format)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                LockError::Io(format!(
                    "failed to create diagnostics directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                LockError::Io(format!(
                    "failed to open diagnostics file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", line).map_err(|e| {
            LockError::Io(format!(
                "failed to write diagnostics to '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Get the actor string for trace entries.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
