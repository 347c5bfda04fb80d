//! Error types for applock.
//!
//! Uses thiserror for derive macros. Lock operations never return these
//! directly; they record them on the handle and report a boolean.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for applock operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Invalid resource name, unusable connection, or rejected option.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The round trip to the resource manager failed.
    #[error("Resource manager call failed: {0}")]
    Transport(String),

    /// The resource manager explicitly refused the request.
    #[error("Lock request denied: {0}")]
    Arbitration(String),

    /// Local I/O failure (config file, diagnostics file).
    #[error("I/O error: {0}")]
    Io(String),
}

impl LockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Configuration(_) => exit_codes::USER_ERROR,
            LockError::Io(_) => exit_codes::USER_ERROR,
            LockError::Transport(_) => exit_codes::TRANSPORT_FAILURE,
            LockError::Arbitration(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for applock operations.
pub type Result<T> = std::result::Result<T, LockError>;
