//! The lock handle state machine.

use super::command::Command;
use super::connection::{Connection, ResultSet};
use super::guard::LockGuard;
use super::types::{
    AcquireStatus, HandleStatus, HeldState, LockMode, LockTimeout, MAX_RESOURCE_LEN,
};
use crate::config::{LockConfig, LockOptions};
use crate::diagnostics::{DiagnosticSink, TraceEntry};
use crate::error::{LockError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A named advisory lock on one resource manager connection.
///
/// `acquire`, `release` and `is_free` each make one round trip and never
/// return errors: failures are appended to [`errors`](Self::errors) and the
/// operation reports its conservative answer. Dropping a handle that holds
/// (or may hold) its lock releases it once.
///
/// The connection is only borrowed for commands; pass `&mut conn` to keep
/// ownership with the caller.
pub struct LockHandle<C: Connection> {
    name: String,
    connection: C,
    config: LockConfig,
    sink: Arc<dyn DiagnosticSink>,
    state: HeldState,
    errors: Vec<LockError>,
    acquired_at: Option<DateTime<Utc>>,
}

impl<C: Connection> LockHandle<C> {
    /// Create a handle for `name` on `connection`.
    ///
    /// # Returns
    ///
    /// * `Ok(LockHandle)` - Configured handle in the `NotHeld` state
    /// * `Err(LockError::Configuration)` - Empty or overlong name, closed
    ///   connection, or invalid options
    pub fn new(
        name: impl Into<String>,
        connection: C,
        options: impl Into<LockOptions>,
    ) -> Result<Self> {
        let name = name.into();
        let options = options.into();
        let sink = options.resolve_sink();
        let diagnostics = options.config.diagnostics_enabled;

        let checked = options
            .config
            .validate()
            .and_then(|()| validate_name(&name))
            .and_then(|()| {
                if connection.is_open() {
                    Ok(())
                } else {
                    Err(LockError::Configuration(
                        "unknown database resource: connection is not open".to_string(),
                    ))
                }
            });

        if let Err(err) = checked {
            if diagnostics {
                append_or_warn(
                    sink.as_ref(),
                    &TraceEntry::new("init", &name, format!("Error: {}", err)),
                );
            }
            return Err(err);
        }

        let mut handle = Self {
            name,
            connection,
            config: LockConfig::default(),
            sink,
            state: HeldState::NotHeld,
            errors: Vec::new(),
            acquired_at: None,
        };
        handle.apply(options);
        Ok(handle)
    }

    /// Replace the handle's configuration.
    ///
    /// Every setting is reset to its default before `options` are applied,
    /// and the error log is cleared. Refused while the lock is held or its
    /// state is unknown.
    pub fn configure(&mut self, options: impl Into<LockOptions>) -> Result<()> {
        if self.state != HeldState::NotHeld {
            return Err(LockError::Configuration(format!(
                "cannot reconfigure lock '{}' while its state is {}",
                self.name, self.state
            )));
        }

        let options = options.into();
        options.config.validate()?;
        self.apply(options);
        Ok(())
    }

    fn apply(&mut self, options: LockOptions) {
        self.errors.clear();
        self.acquired_at = None;

        self.sink = options.resolve_sink();
        self.config = options.config;

        for coercion in self.config.coercions.clone() {
            self.trace("init", coercion.to_string());
        }
        self.trace(
            "init",
            format!(
                "initialised lock object: name={}, mode={}, timeout={}, principal={}",
                self.name, self.config.mode, self.config.timeout_millis, self.config.principal
            ),
        );
    }

    /// Request the lock and confirm it in the lock catalog.
    ///
    /// Returns `true` when the resource manager granted the lock (return
    /// code 0 or 1) and the catalog lists it.
    pub fn acquire(&mut self) -> bool {
        self.trace("acquire", format!("Attempting to lock: {}", self.name));
        let previous = self.state;
        let command = Command::Acquire {
            resource: self.name.clone(),
            mode: self.config.mode,
            timeout: self.config.timeout_millis,
            principal: self.config.principal.clone(),
        };

        match self.run(&command) {
            Ok(result) => {
                let status = result.return_code.map(AcquireStatus::from_code);
                match status {
                    Some(status) if status.is_success() && result.row_count() > 0 => {
                        if previous != HeldState::Held {
                            self.acquired_at = Some(Utc::now());
                        }
                        self.state = HeldState::Held;
                    }
                    Some(status) if status.is_success() => {
                        self.record(
                            "acquire",
                            LockError::Arbitration(format!(
                                "lock '{}' was {} but is missing from the lock catalog",
                                self.name, status
                            )),
                        );
                        self.state = HeldState::NotHeld;
                        self.acquired_at = None;
                    }
                    other => {
                        let detail = match other {
                            Some(status) => status.to_string(),
                            None => "no return code".to_string(),
                        };
                        self.record(
                            "acquire",
                            LockError::Arbitration(format!(
                                "unable to acquire lock '{}': {}",
                                self.name, detail
                            )),
                        );
                    }
                }
            }
            Err(err @ LockError::Arbitration(_)) => self.record("acquire", err),
            Err(err) => {
                self.record("acquire", err);
                if previous != HeldState::NotHeld {
                    self.state = HeldState::Unknown;
                }
            }
        }

        self.trace("acquire", format!("Returning: {}", self.is_held()));
        self.is_held()
    }

    /// Release one session-owned reference to the lock.
    ///
    /// The command is always sent, even when the handle believes it holds
    /// nothing. The new state is `NotHeld` only when the catalog no longer
    /// lists the resource; any remaining row (another reference, or another
    /// session's shared grant) leaves it `Held`. A failed round trip leaves
    /// it `Unknown`.
    pub fn release(&mut self) -> HeldState {
        self.trace("release", format!("Attempting to unlock: {}", self.name));
        let command = Command::Release {
            resource: self.name.clone(),
            principal: self.config.principal.clone(),
        };

        match self.run(&command) {
            Ok(result) => {
                if let Some(code) = result.return_code
                    && code != 0
                {
                    self.record(
                        "release",
                        LockError::Arbitration(format!(
                            "lock '{}' is not held by this session ({})",
                            self.name, code
                        )),
                    );
                }
                self.state = if result.rows.is_empty() {
                    HeldState::NotHeld
                } else {
                    HeldState::Held
                };
            }
            Err(err @ LockError::Arbitration(_)) => self.record("release", err),
            Err(err) => {
                self.record("release", err);
                self.state = HeldState::Unknown;
            }
        }

        if self.state == HeldState::NotHeld {
            self.acquired_at = None;
        }
        self.trace("release", format!("Returning: {}", self.state));
        self.state
    }

    /// Whether the resource looks free right now.
    ///
    /// `true` only when this handle does not record `Held` and the catalog
    /// lists no holder. An empty catalog settles an `Unknown` state to
    /// `NotHeld`. The answer can be stale by the time it is used; use
    /// `acquire` with a timeout to actually wait for the lock.
    pub fn is_free(&mut self) -> bool {
        let command = Command::Probe {
            resource: self.name.clone(),
        };

        match self.run(&command) {
            Ok(result) => {
                if self.state == HeldState::Held || !result.rows.is_empty() {
                    return false;
                }
                if self.state == HeldState::Unknown {
                    self.trace("probe", "Unknown state settled: not held".to_string());
                    self.state = HeldState::NotHeld;
                    self.acquired_at = None;
                }
                true
            }
            Err(err) => {
                self.record("probe", err);
                if self.state == HeldState::Held {
                    self.state = HeldState::Unknown;
                }
                false
            }
        }
    }

    /// Acquire the lock and return a guard that releases it on drop.
    ///
    /// On failure the most recently recorded error is returned.
    pub fn lock(&mut self) -> Result<LockGuard<'_, C>> {
        if self.acquire() {
            return Ok(LockGuard::new(self));
        }
        Err(self.last_error().cloned().unwrap_or_else(|| {
            LockError::Arbitration(format!("lock '{}' was not granted", self.name))
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> LockMode {
        self.config.mode
    }

    pub fn timeout(&self) -> LockTimeout {
        self.config.timeout_millis
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn state(&self) -> HeldState {
        self.state
    }

    pub fn is_held(&self) -> bool {
        self.state == HeldState::Held
    }

    /// Errors recorded since construction or the last `configure`, oldest first.
    pub fn errors(&self) -> &[LockError] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&LockError> {
        self.errors.last()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Mutable access to the connection, for work outside the lock batches.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn status(&self) -> HandleStatus {
        HandleStatus {
            name: self.name.clone(),
            mode: self.config.mode,
            timeout_millis: self.config.timeout_millis,
            state: self.state,
            acquired_at: self.acquired_at,
            error_count: self.errors.len(),
        }
    }

    /// Release for cleanup paths, warning on stderr if it did not go through.
    pub(super) fn release_on_drop(&mut self) {
        let errors_before = self.errors.len();
        self.trace("drop", format!("Releasing lock on drop: {}", self.name));
        let state = self.release();
        if self.errors.len() > errors_before
            && let Some(err) = self.errors.last()
        {
            eprintln!(
                "Warning: failed to release lock '{}' (state: {}): {}",
                self.name, state, err
            );
        }
    }

    fn run(&mut self, command: &Command) -> Result<ResultSet> {
        if self.config.diagnostics_enabled {
            self.trace(command.kind(), format!("SQL={}", command.to_sql()));
        }
        let result = self.connection.execute(command)?;
        self.trace(
            command.kind(),
            format!(
                "return_code={}, num_rows={}",
                result
                    .return_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                result.row_count()
            ),
        );
        Ok(result)
    }

    fn record(&mut self, operation: &str, err: LockError) {
        self.trace(operation, format!("Error: {}", err));
        self.errors.push(err);
    }

    fn trace(&self, operation: &str, message: String) {
        if !self.config.diagnostics_enabled {
            return;
        }
        append_or_warn(
            self.sink.as_ref(),
            &TraceEntry::new(operation, &self.name, message),
        );
    }
}

impl<C: Connection> Drop for LockHandle<C> {
    fn drop(&mut self) {
        if self.state != HeldState::NotHeld {
            self.release_on_drop();
        }
    }
}

impl<C: Connection> std::fmt::Debug for LockHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Write a trace entry, warning on stderr if the sink refuses it.
fn append_or_warn(sink: &dyn DiagnosticSink, entry: &TraceEntry) {
    if let Err(e) = sink.append(entry) {
        eprintln!("Warning: failed to write diagnostics: {}", e);
    }
}

/// Check a resource name before any command is built for it: non-empty and
/// at most [`MAX_RESOURCE_LEN`] characters.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LockError::Configuration(
            "unknown lock handle: name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_RESOURCE_LEN {
        return Err(LockError::Configuration(format!(
            "lock name must be at most {} characters",
            MAX_RESOURCE_LEN
        )));
    }
    Ok(())
}
