//! Session lifecycle engine for books written by a human author and a
//! generating agent over git.
//!
//! A session opens (sync, lock, snapshot, bounded context), the agent writes,
//! and the session closes (validated prose moves to the manuscript, the rest
//! stays in the rolling review document). The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (markers, splitting, pagination,
//!   progress ledger, session phases). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, git, child processes).
//!
//! Orchestration modules ([`open`], [`close`], [`complete`], [`advance`],
//! [`rollback`], [`status`]) coordinate core logic with I/O to implement CLI
//! commands.

pub mod advance;
pub mod book;
pub mod close;
pub mod complete;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod open;
pub mod rollback;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
