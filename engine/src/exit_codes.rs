//! Stable exit codes for `ink` commands.

/// Command succeeded (including `needs_revision` and `needs_outline`).
pub const OK: i32 = 0;
/// Command failed: sync, config, confirmation or any other error.
pub const FAILED: i32 = 1;
/// Another session holds a live lock.
pub const LOCKED: i32 = 2;
/// `ink open` acknowledged a kill request and did not start a session.
pub const KILLED: i32 = 3;
