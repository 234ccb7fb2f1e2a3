//! Restore both branches to the most recent session snapshot.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::book::Book;
use crate::error::EngineError;
use crate::io::lock::LockInspection;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub status: &'static str,
    pub tag: String,
    /// Commit both branches now point at.
    pub head: String,
}

/// Hard-reset durable and draft to the latest `ink-*` tag and force-push them.
///
/// Commits after the tag are discarded locally and on the remote. Tags are
/// left in place so an earlier snapshot stays reachable.
#[instrument(skip_all, fields(root = %root.display(), confirmed))]
pub fn rollback(root: &Path, confirmed: bool, now: DateTime<Utc>) -> Result<RollbackOutcome> {
    if !confirmed {
        return Err(EngineError::ConfirmationRequired.into());
    }
    let book = Book::open(root)?;
    book.sync.git().fetch()?;

    if let LockInspection::Live { age_secs } =
        book.lock.inspect(book.config.session_timeout_minutes, now)?
    {
        return Err(EngineError::LockConflict {
            age_minutes: age_secs / 60,
        }
        .into());
    }

    let Some(tag) = book.sync.latest_snapshot()? else {
        return Err(EngineError::NoSnapshot.into());
    };
    warn!(tag = %tag, "discarding history after snapshot");
    let head = book.sync.rollback(&tag)?;

    Ok(RollbackOutcome {
        status: "rolled_back",
        tag,
        head,
    })
}
