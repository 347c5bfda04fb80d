//! LockConfig and LockOptions definitions.

use super::types::{Coercion, default_principal};
use crate::diagnostics::{DiagnosticSink, FileSink, NoopSink, TraceFormat};
use crate::locks::{LockMode, LockTimeout};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Validated lock configuration.
///
/// Built either programmatically (all fields typed) or from
/// [`RawLockOptions`](super::RawLockOptions) via `LockConfig::from_raw`,
/// which coerces invalid values to defaults and records each coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockConfig {
    /// Requested lock mode (default: Exclusive).
    pub mode: LockMode,

    /// Wait budget forwarded to the resource manager (default: 0 ms).
    pub timeout_millis: LockTimeout,

    /// Whether trace entries are emitted at all.
    pub diagnostics_enabled: bool,

    /// File that receives trace lines when no sink is injected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics_sink: Option<PathBuf>,

    pub diagnostics_format: TraceFormat,

    /// Database principal passed to the lock primitives (default: "public").
    pub principal: String,

    /// Reject invalid raw values instead of coercing them.
    pub strict: bool,

    /// Options that were coerced while building this config.
    #[serde(skip)]
    pub coercions: Vec<Coercion>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            mode: LockMode::default(),
            timeout_millis: LockTimeout::default(),
            diagnostics_enabled: false,
            diagnostics_sink: None,
            diagnostics_format: TraceFormat::default(),
            principal: default_principal(),
            strict: false,
            coercions: Vec::new(),
        }
    }
}

/// Everything a handle is configured with: the config plus an optional
/// injected diagnostic sink.
#[derive(Clone, Default)]
pub struct LockOptions {
    pub config: LockConfig,
    pub sink: Option<Arc<dyn DiagnosticSink>>,
}

impl LockOptions {
    pub fn new(config: LockConfig) -> Self {
        Self { config, sink: None }
    }

    pub fn mode(mut self, mode: LockMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn timeout(mut self, timeout: LockTimeout) -> Self {
        self.config.timeout_millis = timeout;
        self
    }

    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.config.principal = principal.into();
        self
    }

    /// Enable diagnostics and send them to `sink`.
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.config.diagnostics_enabled = true;
        self.sink = Some(sink);
        self
    }

    /// The sink a handle should use: the injected one, else a file sink when
    /// a path is configured, else a no-op.
    pub(crate) fn resolve_sink(&self) -> Arc<dyn DiagnosticSink> {
        if let Some(sink) = &self.sink {
            return Arc::clone(sink);
        }
        match &self.config.diagnostics_sink {
            Some(path) => Arc::new(FileSink::new(path, self.config.diagnostics_format)),
            None => Arc::new(NoopSink),
        }
    }
}

impl From<LockConfig> for LockOptions {
    fn from(config: LockConfig) -> Self {
        Self::new(config)
    }
}

impl std::fmt::Debug for LockOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockOptions")
            .field("config", &self.config)
            .field("sink", &self.sink.as_ref().map(|_| "<injected>"))
            .finish()
    }
}
