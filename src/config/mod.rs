//! Configuration model for lock handles.
//!
//! Options arrive either typed ([`LockOptions`] builder) or raw
//! ([`RawLockOptions`], e.g. from a YAML file). Raw options are coerced:
//! an invalid `mode` becomes Exclusive and an invalid `timeout_millis`
//! becomes 0, and each replacement is recorded as a [`Coercion`]. Unknown
//! keys are ignored for forward compatibility.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::{LockConfig, LockOptions};
pub use types::{Coercion, RawLockOptions};
