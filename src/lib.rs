//! applock: client handles for named advisory locks held by a SQL Server
//! style resource manager.
//!
//! A [`LockHandle`](locks::LockHandle) binds one resource name to one
//! connection and drives the lock through `acquire`, `release` and
//! `is_free`. Every call is a single round trip; failures are recorded on the
//! handle instead of being returned.
//!
//! ```no_run
//! use applock::config::LockOptions;
//! use applock::locks::{LockHandle, LockMode, LockTimeout, MemoryResourceManager};
//!
//! let manager = MemoryResourceManager::new();
//! let mut session = manager.connect();
//! let options = LockOptions::default()
//!     .mode(LockMode::Exclusive)
//!     .timeout(LockTimeout::Millis(60_000));
//!
//! let mut handle = LockHandle::new("nightly-import", &mut session, options)?;
//! if handle.is_free() {
//!     let _guard = handle.lock()?;
//!     // critical section
//! }
//! # Ok::<(), applock::error::LockError>(())
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod exit_codes;
pub mod locks;
