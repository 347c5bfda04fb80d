//! RAII lock guard implementation.

use super::connection::Connection;
use super::handle::LockHandle;
use super::types::HeldState;

/// RAII guard for an acquired lock.
///
/// Created by [`LockHandle::lock`]. When dropped, the lock is released once
/// through the handle. If the release does not go through, a warning is
/// printed but no panic occurs.
#[derive(Debug)]
pub struct LockGuard<'a, C: Connection> {
    handle: &'a mut LockHandle<C>,

    /// Whether the lock has been released manually.
    released: bool,
}

impl<'a, C: Connection> LockGuard<'a, C> {
    pub(super) fn new(handle: &'a mut LockHandle<C>) -> Self {
        Self {
            handle,
            released: false,
        }
    }

    /// The handle this guard holds the lock through.
    pub fn handle(&self) -> &LockHandle<C> {
        self.handle
    }

    /// Manually release the lock.
    ///
    /// Useful when the lock should end before the guard goes out of scope
    /// and the caller wants to inspect the resulting state.
    pub fn release(mut self) -> HeldState {
        self.released = true;
        self.handle.release()
    }
}

impl<C: Connection> Drop for LockGuard<'_, C> {
    fn drop(&mut self) {
        if !self.released {
            self.handle.release_on_drop();
        }
    }
}
