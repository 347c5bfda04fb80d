//! The resource manager connection capability.
//!
//! A `Connection` runs one command batch per call and hands back the status
//! code and catalog rows it produced. Adapters for real drivers render the
//! batch with [`Command::to_sql`] and map driver errors onto
//! [`ConnectionError`].

use super::command::Command;
use crate::error::LockError;
use thiserror::Error;

/// Resource type of application locks in the lock catalog.
pub const APPLICATION_RESOURCE_TYPE: &str = "APPLICATION";

/// One row of the lock catalog (`sys.dm_tran_locks`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub resource_type: String,
    pub request_mode: String,
    pub resource_description: String,
}

/// What a command batch produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    /// Return code of the lock primitive; `None` for catalog-only queries.
    pub return_code: Option<i32>,

    /// Matching catalog rows.
    pub rows: Vec<CatalogRow>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Failure of a single execute round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection is closed or was lost.
    #[error("connection is closed")]
    Closed,

    /// The batch could not be prepared or executed.
    #[error("could not query database: {0}")]
    Statement(String),

    /// The batch raised an error because the lock was refused.
    #[error("{0}")]
    Denied(String),
}

impl From<ConnectionError> for LockError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Denied(msg) => LockError::Arbitration(msg),
            other => LockError::Transport(other.to_string()),
        }
    }
}

/// A usable session on the resource manager.
pub trait Connection {
    /// Execute one command batch atomically.
    fn execute(&mut self, command: &Command) -> Result<ResultSet, ConnectionError>;

    /// Whether the connection can accept commands.
    fn is_open(&self) -> bool {
        true
    }
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn execute(&mut self, command: &Command) -> Result<ResultSet, ConnectionError> {
        (**self).execute(command)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute(&mut self, command: &Command) -> Result<ResultSet, ConnectionError> {
        (**self).execute(command)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
