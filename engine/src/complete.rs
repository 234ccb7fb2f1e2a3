//! Orchestration for sealing the book.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::book::Book;
use crate::core::ledger::{CompletionState, completion_eligible};
use crate::core::markers::{Instruction, extract_instructions};
use crate::core::session::SessionEvent;
use crate::core::split::split_validated;
use crate::io::manuscript::{
    SEALED_PLACEHOLDER, append_validated, cumulative_words, read_rolling, write_creating_parent,
    write_rolling,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompleteOutcome {
    /// Directives are still open; nothing was written.
    NeedsRevision {
        /// Pending section of the rolling document, from its first directive.
        content: String,
        instructions: Vec<Instruction>,
    },
    Sealed {
        total_word_count: u64,
        completion_eligible: bool,
    },
}

/// Seal the book when the synced rolling document carries no directive.
///
/// The remote durable branch is merged first, so a directive pushed from
/// another clone blocks the seal. If writing, committing or pushing the seal
/// fails, the durable branch is reset to where it was and `COMPLETE` is
/// removed.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn complete_book(root: &Path, now: DateTime<Utc>) -> Result<CompleteOutcome> {
    let book = Book::open(root)?;
    book.ensure_not_sealed()?;
    // Work left on draft by an interrupted close belongs to durable.
    if book.sync.on_draft()? {
        book.sync.promote_head()?;
    }
    book.sync.prepare()?;
    let since = book.load_state()?.edits_checked_at;
    let edits = book.sync.sync_external_edits(since)?;
    debug!(edits = edits.len(), "synced before completion check");

    let rolling = read_rolling(&book.paths)?;
    let instructions = extract_instructions(&rolling);
    let total = cumulative_words(&book.paths)?;
    let state = CompletionState::evaluate(
        false,
        total,
        book.config.target_length,
        instructions.len(),
    );
    if !state.may_seal() {
        info!(pending = instructions.len(), "book needs revision before sealing");
        return Ok(CompleteOutcome::NeedsRevision {
            content: split_validated(&rolling).pending.to_string(),
            instructions,
        });
    }
    let _sealed = book.transition(SessionEvent::Seal)?;

    let restore_to = book.sync.git().head_sha()?;
    if let Err(err) = seal_durable(&book, &rolling, now) {
        warn!(err = %format!("{err:#}"), "seal failed; restoring durable head");
        if let Err(reset_err) = book.sync.git().reset_hard(&restore_to) {
            warn!(err = %reset_err, "failed to restore durable head");
        }
        if let Err(remove_err) = remove_if_present(&book.paths.complete_path) {
            warn!(err = %remove_err, "failed to remove completion marker");
        }
        return Err(err);
    }
    book.sync.align_draft()?;
    book.sync.push_draft()?;

    let total_word_count = cumulative_words(&book.paths)?;
    info!(total_word_count, "book sealed");
    Ok(CompleteOutcome::Sealed {
        total_word_count,
        completion_eligible: completion_eligible(total_word_count, book.config.target_length),
    })
}

/// Write, commit and push the seal on the durable branch.
fn seal_durable(book: &Book, rolling: &str, now: DateTime<Utc>) -> Result<()> {
    let remaining = split_validated(rolling).validated;
    append_validated(&book.paths, &remaining, book.config.words_per_page)?;
    write_creating_parent(
        &book.paths.complete_path,
        &format!("{}\n", now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    )?;
    write_rolling(&book.paths, SEALED_PLACEHOLDER)?;

    let commit_paths: Vec<String> = [
        &book.paths.manuscript_path,
        &book.paths.review_path,
        &book.paths.complete_path,
    ]
    .into_iter()
    .map(|p| book.paths.relative(p))
    .collect();
    book.sync.commit_releasing(
        &commit_paths,
        &[book.paths.relative(&book.paths.lock_path)],
        "book: complete",
    )?;
    book.lock.release()?;
    book.sync.push_durable()
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}
