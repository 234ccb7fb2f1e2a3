//! Orchestration for closing a writing session.
//!
//! Close is the only path that moves prose into the permanent manuscript. If a
//! write fails part way, the lock stays held: the next open either reports a
//! conflict or reclaims the lock after the timeout, and no generated prose is
//! silently discarded.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::book::Book;
use crate::core::ledger::{completion_eligible, is_boundary_candidate};
use crate::core::session::SessionEvent;
use crate::core::split::plan_rolling_update;
use crate::core::text::count_prose_words;
use crate::io::changelog::{ChangelogEntry, append_summary, default_summary, write_entry};
use crate::io::manuscript::{append_validated, cumulative_words, read_rolling, write_rolling};
use crate::io::state::write_state;
use crate::io::sync::STAMP_FORMAT;

/// Input for `ink close`.
#[derive(Debug, Clone, Default)]
pub struct CloseRequest {
    /// Generator output; becomes the next rolling document.
    pub content: String,
    pub summary: Option<String>,
    /// Files the caller reports as edited outside the engine this session.
    pub external_edits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CloseOutcome {
    pub status: &'static str,
    pub session_word_count: u32,
    pub validated_word_count: u32,
    pub total_word_count: u64,
    pub target_length: u64,
    pub current_chapter: u32,
    pub current_chapter_word_count: u32,
    pub chapter_close_suggested: bool,
    pub completion_ready: bool,
    pub pages_added: u32,
    pub carried_forward: bool,
    pub changelog: String,
}

#[instrument(skip_all, fields(root = %root.display()))]
pub fn close_session(
    root: &Path,
    request: &CloseRequest,
    now: DateTime<Utc>,
) -> Result<CloseOutcome> {
    let book = Book::open(root)?;
    let closing = book
        .transition(SessionEvent::CloseRequested)
        .context("close session")?;

    if !book.sync.on_draft()? {
        book.sync.enter_draft()?;
    }

    let old_rolling = read_rolling(&book.paths)?;
    let update = plan_rolling_update(&old_rolling, &request.content);
    let session_words = count_prose_words(&request.content);
    let validated_words = count_prose_words(&update.validated);

    let pages_added =
        append_validated(&book.paths, &update.validated, book.config.words_per_page)?;
    write_rolling(&book.paths, &update.rolling)?;

    let summary = request
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| default_summary(now, session_words), String::from);
    append_summary(&book.paths, &summary)?;

    let mut state = book.load_state()?;
    state.record_session(session_words);

    let entry = ChangelogEntry {
        timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        chapter: state.current_chapter,
        session_words,
        validated_words,
        pages_added,
        carried_forward: update.carried_forward,
        external_edits: request.external_edits.clone(),
        summary,
    };
    let changelog = write_entry(&book.paths, now, &entry)?;
    write_state(&book.paths.state_path, &state)?;

    let mut commit_paths: Vec<String> = [
        &book.paths.manuscript_path,
        &book.paths.review_path,
        &book.paths.summary_path,
        &book.paths.state_path,
    ]
    .into_iter()
    .map(|p| book.paths.relative(p))
    .collect();
    commit_paths.push(changelog.clone());
    commit_paths.extend(request.external_edits.iter().cloned());

    // The lock file outlives a failed commit so the session stays held.
    book.sync.commit_releasing(
        &commit_paths,
        &[book.paths.relative(&book.paths.lock_path)],
        &format!("session: close {}", now.format(STAMP_FORMAT)),
    )?;
    book.lock.release()?;
    book.sync.promote_head()?;
    book.sync.push_durable_then_draft()?;
    let _closed = closing.on(SessionEvent::Persisted)?;

    let total_word_count = cumulative_words(&book.paths)?;
    info!(
        session_words,
        validated_words,
        pages_added,
        carried_forward = update.carried_forward,
        "session closed"
    );

    Ok(CloseOutcome {
        status: "closed",
        session_word_count: session_words,
        validated_word_count: validated_words,
        total_word_count,
        target_length: book.config.target_length,
        current_chapter: state.current_chapter,
        current_chapter_word_count: state.current_chapter_word_count,
        chapter_close_suggested: is_boundary_candidate(
            state.current_chapter_word_count,
            book.config.words_per_chapter,
        ),
        completion_ready: completion_eligible(total_word_count, book.config.target_length),
        pages_added,
        carried_forward: update.carried_forward,
        changelog,
    })
}
