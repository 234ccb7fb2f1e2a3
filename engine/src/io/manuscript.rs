//! Permanent manuscript and rolling review document on disk.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::split::{page_cursor, paginate};
use crate::core::text::count_prose_words;
use crate::io::paths::BookPaths;

/// Rolling document written when the book is sealed.
pub const SEALED_PLACEHOLDER: &str = "<!-- INK:COMPLETE -->\n";

/// Read a text file, treating a missing file as empty.
pub fn read_or_empty(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn read_rolling(paths: &BookPaths) -> Result<String> {
    read_or_empty(&paths.review_path)
}

pub fn write_rolling(paths: &BookPaths, contents: &str) -> Result<()> {
    write_creating_parent(&paths.review_path, contents)
}

pub fn read_manuscript(paths: &BookPaths) -> Result<String> {
    read_or_empty(&paths.manuscript_path)
}

/// Append validated prose to the manuscript, paginated from where it left off.
///
/// Returns the number of page markers inserted. Empty text leaves the file
/// untouched.
pub fn append_validated(paths: &BookPaths, validated: &str, words_per_page: u32) -> Result<u32> {
    if validated.trim().is_empty() {
        return Ok(0);
    }
    let existing = read_manuscript(paths)?;
    let paginated = paginate(validated, page_cursor(&existing), words_per_page);

    let mut chunk = String::new();
    if !existing.is_empty() {
        if !existing.ends_with('\n') {
            chunk.push('\n');
        }
        chunk.push('\n');
    }
    chunk.push_str(&paginated.text);
    chunk.push('\n');

    let path = &paths.manuscript_path;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(chunk.as_bytes())
        .with_context(|| format!("append {}", path.display()))?;

    debug!(
        words = count_prose_words(validated),
        pages_added = paginated.pages_added,
        "manuscript appended"
    );
    Ok(paginated.pages_added)
}

/// Prose words across manuscript and rolling document.
pub fn cumulative_words(paths: &BookPaths) -> Result<u64> {
    let manuscript = count_prose_words(&read_manuscript(paths)?);
    let rolling = count_prose_words(&read_rolling(paths)?);
    Ok(u64::from(manuscript) + u64::from(rolling))
}

pub fn append_paragraph(path: &Path, paragraph: &str) -> Result<()> {
    let existing = read_or_empty(path)?;
    let mut contents = existing.trim_end().to_string();
    if !contents.is_empty() {
        contents.push_str("\n\n");
    }
    contents.push_str(paragraph.trim());
    contents.push('\n');
    write_creating_parent(path, &contents)
}

pub fn write_creating_parent(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
