//! Exit code constants for the applock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid configuration)
//! - 3: Resource manager call failed (transport)
//! - 4: Lock could not be acquired

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Transport failure: the resource manager round trip failed.
pub const TRANSPORT_FAILURE: i32 = 3;

/// Lock failure: the resource manager denied the lock request.
pub const LOCK_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, TRANSPORT_FAILURE, LOCK_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }
}
