//! Chapter state storage (`.ink-state.json`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Engine-owned progress counters.
///
/// The counters change only at session close and chapter advance; open only
/// stamps `edits_checked_at`. Committed with the rest of the repository so
/// every clone sees the same counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChapterState {
    /// 1-based index of the chapter being written.
    pub current_chapter: u32,
    /// Prose words generated for the current chapter.
    pub current_chapter_word_count: u32,
    /// When external edits were last collected; uncommitted files modified
    /// after it are external edits at the next open.
    pub edits_checked_at: Option<DateTime<Utc>>,
}

impl Default for ChapterState {
    fn default() -> Self {
        Self {
            current_chapter: 1,
            current_chapter_word_count: 0,
            edits_checked_at: None,
        }
    }
}

impl ChapterState {
    pub fn record_session(&mut self, session_words: u32) {
        self.current_chapter_word_count =
            self.current_chapter_word_count.saturating_add(session_words);
    }

    pub fn mark_edits_checked(&mut self, at: DateTime<Utc>) {
        self.edits_checked_at = Some(at);
    }

    pub fn advance(&mut self, next: u32) {
        self.current_chapter = next;
        self.current_chapter_word_count = 0;
    }
}

/// Load chapter state, defaulting when the book has never run a session.
pub fn load_state(path: &Path) -> Result<ChapterState> {
    if !path.exists() {
        debug!(path = %path.display(), "no chapter state yet; using defaults");
        return Ok(ChapterState::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let state: ChapterState = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    debug!(
        chapter = state.current_chapter,
        words = state.current_chapter_word_count,
        "chapter state loaded"
    );
    Ok(state)
}

/// Atomically write chapter state to disk (temp file + rename).
pub fn write_state(path: &Path, state: &ChapterState) -> Result<()> {
    debug!(
        path = %path.display(),
        chapter = state.current_chapter,
        words = state.current_chapter_word_count,
        "writing chapter state"
    );
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}
