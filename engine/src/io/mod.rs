//! I/O helpers for engine operations.

pub mod changelog;
pub mod config;
pub mod context;
pub mod git;
pub mod lock;
pub mod manuscript;
pub mod paths;
pub mod process;
pub mod state;
pub mod sync;
