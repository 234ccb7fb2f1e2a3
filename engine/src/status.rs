//! Read-only report of where the book stands.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::book::Book;
use crate::core::ledger::{ChapterProgress, CompletionState, chapter_progress_pct};
use crate::core::markers::extract_instructions;
use crate::core::session::SessionPhase;
use crate::core::text::count_prose_words;
use crate::io::lock::LockInspection;
use crate::io::manuscript::{cumulative_words, read_manuscript, read_rolling};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub status: &'static str,
    pub phase: SessionPhase,
    pub current_chapter: u32,
    pub current_chapter_word_count: u32,
    pub chapter_progress_pct: u32,
    pub chapter_close_suggested: bool,
    pub manuscript_word_count: u32,
    pub total_word_count: u64,
    pub target_length: u64,
    pub completion_eligible: bool,
    pub lock: LockInspection,
    pub lock_age_minutes: Option<i64>,
    pub kill_requested: bool,
    pub sealed: bool,
    pub pending_instructions: usize,
}

/// Inspect the working tree without touching git or any file.
pub fn book_status(root: &Path, now: DateTime<Utc>) -> Result<StatusReport> {
    let book = Book::open(root)?;
    let state = book.load_state()?;
    let lock = book.lock.inspect(book.config.session_timeout_minutes, now)?;
    let sealed = book.paths.is_sealed();

    let manuscript_word_count = count_prose_words(&read_manuscript(&book.paths)?);
    let total_word_count = cumulative_words(&book.paths)?;
    let pending_instructions = extract_instructions(&read_rolling(&book.paths)?).len();
    let progress = ChapterProgress::evaluate(
        state.current_chapter,
        state.current_chapter_word_count,
        book.config.words_per_chapter,
    );
    let completion = CompletionState::evaluate(
        sealed,
        total_word_count,
        book.config.target_length,
        pending_instructions,
    );

    Ok(StatusReport {
        status: "ok",
        phase: book.phase(),
        current_chapter: state.current_chapter,
        current_chapter_word_count: state.current_chapter_word_count,
        chapter_progress_pct: chapter_progress_pct(
            state.current_chapter_word_count,
            book.config.words_per_chapter,
        ),
        chapter_close_suggested: progress.is_candidate(),
        manuscript_word_count,
        total_word_count,
        target_length: book.config.target_length,
        completion_eligible: completion == CompletionState::Eligible,
        lock,
        lock_age_minutes: lock.age_minutes(),
        kill_requested: book.paths.kill_path.exists(),
        sealed,
        pending_instructions,
    })
}
