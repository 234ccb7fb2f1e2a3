//! Progress ledger: chapter candidacy, advancement and completion states.
//!
//! The ledger only signals. Advancing a chapter or sealing the book is done by
//! the orchestration layer after checking the state returned here.

use serde::Serialize;

/// Chapter counter share (percent) at which a chapter may be closed.
pub const BOUNDARY_THRESHOLD_PCT: u64 = 90;

/// Allowed distance from the target length (percent) for completion.
pub const COMPLETION_TOLERANCE_PCT: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChapterProgress {
    WritingChapter { current: u32 },
    /// Word count has reached the boundary threshold.
    ChapterBoundaryCandidate { current: u32 },
}

impl ChapterProgress {
    pub fn evaluate(current: u32, chapter_words: u32, words_per_chapter: u32) -> Self {
        if is_boundary_candidate(chapter_words, words_per_chapter) {
            Self::ChapterBoundaryCandidate { current }
        } else {
            Self::WritingChapter { current }
        }
    }

    pub fn is_candidate(self) -> bool {
        matches!(self, Self::ChapterBoundaryCandidate { .. })
    }
}

pub fn is_boundary_candidate(chapter_words: u32, words_per_chapter: u32) -> bool {
    u64::from(chapter_words) * 100 >= u64::from(words_per_chapter) * BOUNDARY_THRESHOLD_PCT
}

/// Chapter progress as a whole percent, capped at 100.
pub fn chapter_progress_pct(chapter_words: u32, words_per_chapter: u32) -> u32 {
    if words_per_chapter == 0 {
        return 0;
    }
    let pct = u64::from(chapter_words) * 100 / u64::from(words_per_chapter);
    u32::try_from(pct.min(100)).unwrap_or(100)
}

/// `|total - target| <= 10% of target`.
pub fn completion_eligible(total_words: u64, target_length: u64) -> bool {
    total_words.abs_diff(target_length) * 100 <= target_length * COMPLETION_TOLERANCE_PCT
}

/// Outcome of an attempt to move to the next chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceDecision {
    /// The next chapter has no outline on disk; nothing may change.
    OutlineMissing { next: u32 },
    Advanced { next: u32 },
}

pub fn decide_advance(current: u32, next_outline_exists: bool) -> AdvanceDecision {
    let next = current.saturating_add(1);
    if next_outline_exists {
        AdvanceDecision::Advanced { next }
    } else {
        AdvanceDecision::OutlineMissing { next }
    }
}

/// Where the book stands with respect to sealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    NotEligible,
    Eligible,
    /// Directives are still waiting in the rolling document.
    NeedsRevision { pending_directives: usize },
    Sealed,
}

impl CompletionState {
    pub fn evaluate(
        sealed: bool,
        total_words: u64,
        target_length: u64,
        pending_directives: usize,
    ) -> Self {
        if sealed {
            Self::Sealed
        } else if pending_directives > 0 {
            Self::NeedsRevision { pending_directives }
        } else if completion_eligible(total_words, target_length) {
            Self::Eligible
        } else {
            Self::NotEligible
        }
    }

    /// Whether `complete` may seal the book from this state.
    ///
    /// Eligibility is advisory: the caller decides when the story ends, so a
    /// book below the tolerance band may still be sealed once it is clean.
    pub fn may_seal(self) -> bool {
        matches!(self, Self::Eligible | Self::NotEligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_within_ten_percent() {
        assert!(completion_eligible(85_000, 90_000));
        assert!(!completion_eligible(80_000, 90_000));
        assert!(completion_eligible(99_000, 90_000));
        assert!(!completion_eligible(99_001, 90_000));
    }

    #[test]
    fn boundary_at_ninety_percent() {
        assert!(!is_boundary_candidate(2_699, 3_000));
        assert!(is_boundary_candidate(2_700, 3_000));
        assert_eq!(
            ChapterProgress::evaluate(4, 2_700, 3_000),
            ChapterProgress::ChapterBoundaryCandidate { current: 4 }
        );
        assert!(!ChapterProgress::evaluate(4, 10, 3_000).is_candidate());
    }

    #[test]
    fn progress_pct_handles_zero_target() {
        assert_eq!(chapter_progress_pct(1_500, 3_000), 50);
        assert_eq!(chapter_progress_pct(4_500, 3_000), 100);
        assert_eq!(chapter_progress_pct(10, 0), 0);
    }

    #[test]
    fn advance_requires_next_outline() {
        assert_eq!(
            decide_advance(3, false),
            AdvanceDecision::OutlineMissing { next: 4 }
        );
        assert_eq!(decide_advance(3, true), AdvanceDecision::Advanced { next: 4 });
    }

    #[test]
    fn pending_directives_block_sealing() {
        let state = CompletionState::evaluate(false, 90_000, 90_000, 2);
        assert_eq!(
            state,
            CompletionState::NeedsRevision {
                pending_directives: 2
            }
        );
        assert!(!state.may_seal());
        assert!(CompletionState::evaluate(false, 90_000, 90_000, 0).may_seal());
        assert!(!CompletionState::evaluate(true, 90_000, 90_000, 0).may_seal());
    }
}
