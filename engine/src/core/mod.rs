//! Deterministic, pure logic shared by the session engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and counters and return deterministic outputs suitable for tests.

pub mod ledger;
pub mod markers;
pub mod session;
pub mod split;
pub mod text;
