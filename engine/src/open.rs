//! Orchestration for opening a writing session.
//!
//! Opening syncs the repository, takes the session lock, snapshots the
//! pre-session state and hands the generator a bounded context. A kill request
//! or a live lock aborts before any content is touched.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::book::Book;
use crate::core::session::{SessionEvent, SessionPhase};
use crate::io::config::BookConfig;
use crate::io::context::{BookContext, aggregate};
use crate::io::lock::Acquisition;
use crate::io::paths::{KILL_FILE, LOCK_FILE, STATE_FILE};
use crate::io::state::write_state;

/// Payload printed by `ink open`.
#[derive(Debug, Clone, Serialize)]
pub struct OpenPayload {
    pub status: &'static str,
    pub phase: SessionPhase,
    /// Another session holds a live lock.
    pub session_already_run: bool,
    pub kill_requested: bool,
    pub stale_lock_recovered: bool,
    pub lock_age_minutes: Option<i64>,
    pub snapshot_tag: Option<String>,
    pub external_edits: Vec<String>,
    pub config: BookConfig,
    #[serde(flatten)]
    pub context: Option<BookContext>,
}

impl OpenPayload {
    fn aborted(phase: SessionPhase, config: BookConfig) -> Self {
        Self {
            status: "aborted",
            phase,
            session_already_run: false,
            kill_requested: false,
            stale_lock_recovered: false,
            lock_age_minutes: None,
            snapshot_tag: None,
            external_edits: Vec::new(),
            config,
            context: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase == SessionPhase::Open
    }
}

/// Open a session in `root` at time `now`.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn open_session(root: &Path, now: DateTime<Utc>) -> Result<OpenPayload> {
    let mut book = Book::open(root)?;
    book.sync.prepare()?;
    let mut phase = book.transition(SessionEvent::Begin)?;

    if book.paths.kill_path.exists() {
        phase = phase.on(SessionEvent::KillRequested)?;
        acknowledge_kill(&book)?;
        info!("kill request acknowledged; session aborted");
        return Ok(OpenPayload {
            kill_requested: true,
            ..OpenPayload::aborted(phase, book.config)
        });
    }

    let since = book.load_state()?.edits_checked_at;
    let stale_lock_recovered = match book.lock.acquire(book.config.session_timeout_minutes, now)? {
        Acquisition::Conflict { age_secs } => {
            phase = phase.on(SessionEvent::LockConflict)?;
            info!(age_secs, "session already running");
            return Ok(OpenPayload {
                session_already_run: true,
                lock_age_minutes: Some(age_secs / 60),
                ..OpenPayload::aborted(phase, book.config)
            });
        }
        Acquisition::Acquired { stale_recovered } => {
            if stale_recovered {
                phase = phase.on(SessionEvent::StaleLockReclaimed)?;
                warn!("stale session lock reclaimed");
            }
            stale_recovered
        }
    };

    let checked_at = Utc::now();
    let (external_edits, tag) = match sync_and_snapshot(&book, since, now) {
        Ok(synced) => synced,
        Err(err) => {
            // The lock is not committed yet; drop it so the next open is not blocked.
            if let Err(release_err) = book.lock.release() {
                warn!(err = %release_err, "failed to release lock after sync failure");
            }
            return Err(err);
        }
    };

    // The merge may have brought newer counters; stamp those.
    book.reload_config()?;
    let mut state = book.load_state()?;
    state.mark_edits_checked(checked_at);
    write_state(&book.paths.state_path, &state)?;
    book.sync.commit_paths(
        &[LOCK_FILE.to_string(), STATE_FILE.to_string()],
        &format!("session: open {tag}"),
    )?;
    book.sync.push_durable_with_tag(&tag)?;
    book.sync.enter_draft()?;
    phase = phase.on(SessionEvent::LockAcquired)?;

    let context = aggregate(&book.paths, &book.config, &state, &external_edits)?;
    info!(
        tag = %tag,
        edits = external_edits.len(),
        instructions = context.current_review.instructions.len(),
        "session open"
    );

    Ok(OpenPayload {
        status: "open",
        phase,
        session_already_run: false,
        kill_requested: false,
        stale_lock_recovered,
        lock_age_minutes: None,
        snapshot_tag: Some(tag),
        external_edits,
        config: book.config,
        context: Some(context),
    })
}

fn sync_and_snapshot(
    book: &Book,
    since: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(Vec<String>, String)> {
    let edits = book.sync.sync_external_edits(since)?;
    let tag = book.sync.snapshot(now)?;
    Ok((edits, tag))
}

/// Remove the kill request and any lock, and publish the acknowledgement.
fn acknowledge_kill(book: &Book) -> Result<()> {
    let kill_path = &book.paths.kill_path;
    std::fs::remove_file(kill_path).with_context(|| format!("remove {}", kill_path.display()))?;
    book.lock.release()?;
    book.sync.commit_paths(
        &[KILL_FILE.to_string(), LOCK_FILE.to_string()],
        "chore: acknowledge kill request",
    )?;
    book.sync.push_durable()
}
