//! Fixed layout of a book repository.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

pub const GLOBAL_DIR: &str = "Global Material";
pub const CHAPTERS_DIR: &str = "Chapters material";
pub const REVIEW_DIR: &str = "Review";
pub const MANUSCRIPT_DIR: &str = "Current version";
pub const CHANGELOG_DIR: &str = "Changelog";

pub const CONFIG_FILE: &str = "Config.toml";
pub const SUMMARY_FILE: &str = "Summary.md";
pub const LOCK_FILE: &str = ".ink-running";
pub const KILL_FILE: &str = ".ink-kill";
pub const STATE_FILE: &str = ".ink-state.json";
pub const COMPLETE_FILE: &str = "COMPLETE";

/// Paths that only the engine writes; never reported as external edits.
const ENGINE_OWNED: &[&str] = &[LOCK_FILE, KILL_FILE, STATE_FILE];

#[derive(Debug, Clone)]
pub struct BookPaths {
    pub root: PathBuf,
    pub global_dir: PathBuf,
    pub chapters_dir: PathBuf,
    pub changelog_dir: PathBuf,
    pub config_path: PathBuf,
    pub summary_path: PathBuf,
    pub review_path: PathBuf,
    pub manuscript_path: PathBuf,
    pub state_path: PathBuf,
    pub lock_path: PathBuf,
    pub kill_path: PathBuf,
    pub complete_path: PathBuf,
}

impl BookPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let global_dir = root.join(GLOBAL_DIR);
        Self {
            chapters_dir: root.join(CHAPTERS_DIR),
            changelog_dir: root.join(CHANGELOG_DIR),
            config_path: global_dir.join(CONFIG_FILE),
            summary_path: global_dir.join(SUMMARY_FILE),
            review_path: root.join(REVIEW_DIR).join("current.md"),
            manuscript_path: root.join(MANUSCRIPT_DIR).join("Full_Book.md"),
            state_path: root.join(STATE_FILE),
            lock_path: root.join(LOCK_FILE),
            kill_path: root.join(KILL_FILE),
            complete_path: root.join(COMPLETE_FILE),
            global_dir,
            root,
        }
    }

    /// Outline file for chapter `n` (1-based, two-digit).
    pub fn chapter_outline(&self, n: u32) -> PathBuf {
        self.chapters_dir.join(format!("Chapter_{n:02}.md"))
    }

    /// Path relative to the repository root, with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn is_sealed(&self) -> bool {
        self.complete_path.exists()
    }
}

/// First of `base`, `base-2`, `base-3`… for which `taken` is false.
pub fn first_free_name(base: &str, taken: impl Fn(&str) -> Result<bool>) -> Result<String> {
    for suffix in 1..=999u32 {
        let name = if suffix == 1 {
            base.to_string()
        } else {
            format!("{base}-{suffix}")
        };
        if !taken(&name)? {
            return Ok(name);
        }
    }

    Err(anyhow!(
        "unable to find a free name from base '{base}' (too many collisions)"
    ))
}

/// Whether a repository-relative path belongs to the engine rather than the
/// collaborators.
pub fn is_engine_owned(rel: &str) -> bool {
    rel == ".git" || rel.starts_with(".git/") || ENGINE_OWNED.contains(&rel)
}
