//! Per-session changelog entries and the narrative log.
//!
//! Changelog files are product artifacts: one immutable file per closed
//! session under `Changelog/`, independent from tracing output.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

use crate::io::manuscript::{append_paragraph, write_creating_parent};
use crate::io::paths::{BookPaths, first_free_name};
use crate::io::sync::STAMP_FORMAT;

const CHANGELOG_TEMPLATE: &str = include_str!("templates/changelog.md");

#[derive(Debug, Clone, Serialize)]
pub struct ChangelogEntry {
    pub timestamp: String,
    pub chapter: u32,
    pub session_words: u32,
    pub validated_words: u32,
    pub pages_added: u32,
    pub carried_forward: bool,
    pub external_edits: Vec<String>,
    pub summary: String,
}

pub fn render_entry(entry: &ChangelogEntry) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("changelog", CHANGELOG_TEMPLATE)
        .context("load changelog template")?;
    let template = env.get_template("changelog")?;
    let mut rendered = template
        .render(entry)
        .context("render changelog entry")?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}

/// Write the entry to `Changelog/<stamp>.md`, never overwriting an earlier one.
///
/// Returns the path relative to the repository root.
pub fn write_entry(paths: &BookPaths, at: DateTime<Utc>, entry: &ChangelogEntry) -> Result<String> {
    let base = at.format(STAMP_FORMAT).to_string();
    let name = first_free_name(&base, |candidate| {
        Ok(paths.changelog_dir.join(format!("{candidate}.md")).exists())
    })?;
    let path: PathBuf = paths.changelog_dir.join(format!("{name}.md"));
    write_creating_parent(&path, &render_entry(entry)?)?;
    debug!(path = %path.display(), "changelog entry written");
    Ok(paths.relative(&path))
}

/// Default narrative log line for a session closed without a summary.
pub fn default_summary(at: DateTime<Utc>, session_words: u32) -> String {
    format!(
        "Session {} — {session_words} words written.",
        at.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Append one paragraph to the narrative log.
pub fn append_summary(paths: &BookPaths, paragraph: &str) -> Result<()> {
    append_paragraph(&paths.summary_path, paragraph)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry() -> ChangelogEntry {
        ChangelogEntry {
            timestamp: "2026-03-01T09:30:00Z".to_string(),
            chapter: 2,
            session_words: 1_450,
            validated_words: 1_300,
            pages_added: 4,
            carried_forward: false,
            external_edits: vec!["Global Material/Characters.md".to_string()],
            summary: "Mara reaches the lighthouse.".to_string(),
        }
    }

    #[test]
    fn renders_counts_and_edits() {
        let text = render_entry(&entry()).expect("render");
        assert!(text.starts_with("# Session 2026-03-01T09:30:00Z"));
        assert!(text.contains("- Words generated: 1450"));
        assert!(text.contains("- Global Material/Characters.md"));
        assert!(text.contains("Mara reaches the lighthouse."));
        assert!(!text.contains("carried forward"));
    }

    #[test]
    fn renders_none_without_edits() {
        let mut e = entry();
        e.external_edits.clear();
        e.carried_forward = true;
        let text = render_entry(&e).expect("render");
        assert!(text.contains("None."));
        assert!(text.contains("Pending directives carried forward: yes"));
    }

    #[test]
    fn same_second_entries_get_suffixes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = BookPaths::new(temp.path());
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();

        let first = write_entry(&paths, at, &entry()).expect("first");
        let second = write_entry(&paths, at, &entry()).expect("second");
        assert_eq!(first, "Changelog/2026-03-01-09-30-00.md");
        assert_eq!(second, "Changelog/2026-03-01-09-30-00-2.md");
    }

    #[test]
    fn default_summary_mentions_word_count() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(
            default_summary(at, 812),
            "Session 2026-03-01 09:30 UTC — 812 words written."
        );
    }
}
