//! Typed failures surfaced to the caller.
//!
//! Operations return `anyhow::Result`; an [`EngineError`] somewhere in the
//! chain decides the reported `kind` and the exit code.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("another session holds the lock (age {age_minutes} min)")]
    LockConflict { age_minutes: i64 },

    #[error("git {command} failed: {message}")]
    SyncFailure { command: String, message: String },

    #[error("no active session: lock file is missing")]
    NoActiveSession,

    #[error("book is already complete")]
    AlreadySealed,

    #[error("config not found at {path} (repository not initialized)")]
    ConfigMissing { path: PathBuf },

    #[error("config at {path} is invalid: {message}")]
    ConfigMalformed { path: PathBuf, message: String },

    #[error("rollback is destructive and needs explicit confirmation")]
    ConfirmationRequired,

    #[error("no session snapshot tag to roll back to")]
    NoSnapshot,
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LockConflict { .. } => "lock_conflict",
            Self::SyncFailure { .. } => "sync_failure",
            Self::NoActiveSession => "no_active_session",
            Self::AlreadySealed => "already_sealed",
            Self::ConfigMissing { .. } => "config_missing",
            Self::ConfigMalformed { .. } => "config_malformed",
            Self::ConfirmationRequired => "confirmation_required",
            Self::NoSnapshot => "no_snapshot",
        }
    }
}

/// First [`EngineError`] in the context chain of `err`.
pub fn find_engine_error(err: &anyhow::Error) -> Option<&EngineError> {
    err.chain().find_map(|cause| cause.downcast_ref::<EngineError>())
}
