//! Advisory lock handles.
//!
//! This module implements client-side handles for named application locks
//! arbitrated by a SQL Server style resource manager:
//! - `sp_getapplock` to acquire, inside one transaction with a catalog check
//! - `sp_releaseapplock` to release
//! - `sys.dm_tran_locks` to confirm and probe
//!
//! # Ownership
//!
//! Locks are requested with `@LockOwner = 'Session'`, so they live as long as
//! the connection's session unless released. The handle never opens or
//! closes connections.
//!
//! # RAII Guards
//!
//! [`LockHandle::lock`] returns a guard that releases the lock when dropped.
//! A handle dropped while it still holds its lock releases it too. Failed
//! releases during drop print a warning but do not panic.

mod command;
mod connection;
mod guard;
mod handle;
pub mod memory;
mod types;


// Re-export public API
pub use command::{Command, like_pattern, quote_literal};
pub use connection::{
    APPLICATION_RESOURCE_TYPE, CatalogRow, Connection, ConnectionError, ResultSet,
};
pub use guard::LockGuard;
pub use handle::{LockHandle, validate_name};
pub use memory::{MemoryResourceManager, MemorySession};
pub use types::{
    AcquireStatus, CATALOG_NAME_LEN, HandleStatus, HeldState, LockMode, LockTimeout,
    MAX_RESOURCE_LEN, catalog_name,
};
