//! Context aggregator: the bounded snapshot handed to the generator.
//!
//! The book grows every session while the context budget does not, so two
//! bounds always apply: the narrative log is cut to its last few substantive
//! paragraphs, and the next chapter outline is only loaded near a chapter
//! boundary.

use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::ledger::{ChapterProgress, chapter_progress_pct};
use crate::core::markers::{Instruction, extract_instructions, strip_directives};
use crate::core::text::{count_prose_words, truncate_summary, truncate_to_last_words};
use crate::io::config::BookConfig;
use crate::io::manuscript::{cumulative_words, read_rolling};
use crate::io::paths::{BookPaths, CONFIG_FILE, SUMMARY_FILE};
use crate::io::state::ChapterState;

/// Tokens held back for instructions, reference material and the reply.
const OVERHEAD_TOKENS: u64 = 60_000;
/// Tokens per word, scaled by 100.
const TOKENS_PER_WORD_X100: u64 = 135;
/// Rolling document cap when the window is smaller than the overhead.
const MIN_ROLLING_WORDS: u32 = 2_000;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MaterialFile {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChapterOutline {
    pub chapter: u32,
    pub path: String,
    pub content: String,
    /// Listed among this session's external edits.
    pub modified: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Chapters {
    pub current: Option<ChapterOutline>,
    pub next: Option<ChapterOutline>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CurrentReview {
    /// Rolling document with author directives removed.
    pub content: String,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WordCount {
    pub total: u64,
    pub target: u64,
    pub remaining: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BookContext {
    pub global_material: Vec<MaterialFile>,
    pub chapters: Chapters,
    pub current_review: CurrentReview,
    pub word_count: WordCount,
    pub chapter_close_suggested: bool,
    pub current_chapter_word_count: u32,
    pub chapter_progress_pct: u32,
}

/// Assemble the session context from disk.
pub fn aggregate(
    paths: &BookPaths,
    config: &BookConfig,
    state: &ChapterState,
    external_edits: &[String],
) -> Result<BookContext> {
    let progress = ChapterProgress::evaluate(
        state.current_chapter,
        state.current_chapter_word_count,
        config.words_per_chapter,
    );

    let global_material = load_global_material(paths, config.summary_context_entries)?;
    let current = load_chapter(paths, state.current_chapter, external_edits)?;
    let next = if progress.is_candidate() {
        info!(next = state.current_chapter + 1, "near chapter boundary; loading next outline");
        load_chapter(paths, state.current_chapter.saturating_add(1), external_edits)?
    } else {
        None
    };

    let current_review = load_review(paths, config.context_window_tokens)?;
    let word_count = load_word_count(paths, config.target_length)?;

    Ok(BookContext {
        global_material,
        chapters: Chapters { current, next },
        current_review,
        word_count,
        chapter_close_suggested: progress.is_candidate(),
        current_chapter_word_count: state.current_chapter_word_count,
        chapter_progress_pct: chapter_progress_pct(
            state.current_chapter_word_count,
            config.words_per_chapter,
        ),
    })
}

/// Every file directly in `Global Material/` except the config, sorted by
/// name. The narrative log is truncated.
pub fn load_global_material(paths: &BookPaths, summary_entries: usize) -> Result<Vec<MaterialFile>> {
    let dir = &paths.global_dir;
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        if filename == CONFIG_FILE {
            continue;
        }
        let path = entry.path();
        let mut content =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        if filename == SUMMARY_FILE {
            content = truncate_summary(&content, summary_entries);
        }
        files.push(MaterialFile { filename, content });
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    debug!(count = files.len(), "global material loaded");
    Ok(files)
}

pub fn load_chapter(
    paths: &BookPaths,
    chapter: u32,
    external_edits: &[String],
) -> Result<Option<ChapterOutline>> {
    let path = paths.chapter_outline(chapter);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let rel = paths.relative(&path);
    Ok(Some(ChapterOutline {
        chapter,
        modified: external_edits.contains(&rel),
        path: rel,
        content,
    }))
}

/// Rolling document with directives stripped and bounded to the context
/// budget, plus its extracted instructions.
pub fn load_review(paths: &BookPaths, context_window_tokens: u64) -> Result<CurrentReview> {
    let raw = read_rolling(paths)?;
    let instructions = extract_instructions(&raw);
    let mut content = strip_directives(&raw);

    let budget = rolling_word_budget(context_window_tokens);
    let words = count_prose_words(&content);
    if words > budget {
        info!(words, budget, "truncating rolling document to context budget");
        content = truncate_to_last_words(&content, budget);
    }
    Ok(CurrentReview {
        content,
        instructions,
    })
}

/// Words of rolling document that fit in the model context.
pub fn rolling_word_budget(context_window_tokens: u64) -> u32 {
    if context_window_tokens <= OVERHEAD_TOKENS {
        return MIN_ROLLING_WORDS;
    }
    let words = (context_window_tokens - OVERHEAD_TOKENS) * 100 / TOKENS_PER_WORD_X100;
    u32::try_from(words).unwrap_or(u32::MAX)
}

pub fn load_word_count(paths: &BookPaths, target: u64) -> Result<WordCount> {
    let total = cumulative_words(paths)?;
    Ok(WordCount {
        total,
        target,
        remaining: target.saturating_sub(total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::manuscript::write_creating_parent;

    fn seeded() -> (tempfile::TempDir, BookPaths) {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = BookPaths::new(temp.path());
        write_creating_parent(&paths.config_path, "target_length = 1000\n").expect("config");
        write_creating_parent(&paths.global_dir.join("Style.md"), "Terse.").expect("style");
        write_creating_parent(&paths.chapter_outline(1), "Ch1 outline").expect("ch1");
        write_creating_parent(&paths.chapter_outline(2), "Ch2 outline").expect("ch2");
        (temp, paths)
    }

    fn config() -> BookConfig {
        BookConfig {
            target_length: 1_000,
            chapter_count: 2,
            words_per_chapter: 100,
            ..BookConfig::default()
        }
    }

    #[test]
    fn budget_matches_window_size() {
        assert_eq!(rolling_word_budget(200_000), 103_703);
        assert_eq!(rolling_word_budget(32_000), MIN_ROLLING_WORDS);
    }

    #[test]
    fn next_outline_only_near_boundary() {
        let (_temp, paths) = seeded();
        let mut state = ChapterState {
            current_chapter_word_count: 10,
            ..ChapterState::default()
        };

        let ctx = aggregate(&paths, &config(), &state, &[]).expect("aggregate");
        assert!(ctx.chapters.current.is_some());
        assert!(ctx.chapters.next.is_none());
        assert!(!ctx.chapter_close_suggested);

        state.current_chapter_word_count = 95;
        let edits = vec!["Chapters material/Chapter_02.md".to_string()];
        let ctx = aggregate(&paths, &config(), &state, &edits).expect("aggregate");
        let next = ctx.chapters.next.expect("next outline");
        assert_eq!(next.content, "Ch2 outline");
        assert!(next.modified);
        assert_eq!(ctx.chapter_progress_pct, 95);
    }

    #[test]
    fn config_is_not_reference_material() {
        let (_temp, paths) = seeded();
        let files = load_global_material(&paths, 5).expect("load");
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["Style.md"]);
    }

    #[test]
    fn review_strips_directives_but_reports_them() {
        let (_temp, paths) = seeded();
        write_creating_parent(
            &paths.review_path,
            "<!-- INK:NEW:START -->\nDraft.\n<!-- INK: cut this -->\n<!-- INK:NEW:END -->\n",
        )
        .expect("review");
        let review = load_review(&paths, 200_000).expect("review");
        assert_eq!(review.instructions.len(), 1);
        assert_eq!(review.instructions[0].directive, "cut this");
        assert!(!review.content.contains("cut this"));
        assert!(review.content.contains("<!-- INK:NEW:START -->"));
    }
}
