//! Move the ledger to the next chapter.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument};

use crate::book::Book;
use crate::core::ledger::{AdvanceDecision, decide_advance};
use crate::io::state::write_state;
use crate::io::sync::DURABLE_BRANCH;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// The outline for the next chapter does not exist yet; nothing changed.
    NeedsOutline { next_chapter: u32, outline: String },
    Advanced { chapter: u32, outline: String },
}

/// Advance to chapter N+1 when its outline exists.
///
/// Outside a session the commit lands on durable; the draft branch is reset
/// from durable at the next open and would drop it otherwise. Nothing is
/// pushed: the next close or open publishes it.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn advance_chapter(root: &Path) -> Result<AdvanceOutcome> {
    let book = Book::open(root)?;
    book.ensure_not_sealed()?;
    if !book.lock.is_held() && book.sync.on_draft()? {
        book.sync.promote_head()?;
        book.sync.git().checkout(DURABLE_BRANCH)?;
    }

    let mut state = book.load_state()?;
    let next = state.current_chapter.saturating_add(1);
    let outline_path = book.paths.chapter_outline(next);
    let outline = book.paths.relative(&outline_path);

    match decide_advance(state.current_chapter, outline_path.exists()) {
        AdvanceDecision::OutlineMissing { next } => {
            info!(next, outline = %outline, "next chapter has no outline");
            Ok(AdvanceOutcome::NeedsOutline {
                next_chapter: next,
                outline,
            })
        }
        AdvanceDecision::Advanced { next } => {
            state.advance(next);
            write_state(&book.paths.state_path, &state)?;
            let state_rel = book.paths.relative(&book.paths.state_path);
            book.sync
                .commit_paths(&[state_rel], &format!("chore: advance to chapter {next}"))?;
            info!(chapter = next, "chapter advanced");
            Ok(AdvanceOutcome::Advanced {
                chapter: next,
                outline,
            })
        }
    }
}
