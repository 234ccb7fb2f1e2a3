//! Book configuration stored under `Global Material/Config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

/// Per-book settings (TOML).
///
/// Written once by the scaffolding flow and edited by humans afterwards. Only
/// `target_length` and `chapter_count` are required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BookConfig {
    pub language: String,
    /// Target length of the whole book, in words.
    pub target_length: u64,
    pub chapter_count: u32,
    pub chapter_structure: String,
    pub words_per_session: u32,
    pub words_per_chapter: u32,
    /// Words per manuscript page between `INK:PAGE` markers.
    pub words_per_page: u32,
    /// Narrative log paragraphs included in each session context.
    pub summary_context_entries: usize,
    /// Model context size the rolling document is bounded against.
    pub context_window_tokens: u64,
    /// A lock older than this is considered abandoned.
    pub session_timeout_minutes: u64,
    /// Wall-clock limit for a single git command.
    pub git_timeout_secs: u64,
    pub remote: String,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            target_length: 0,
            chapter_count: 0,
            chapter_structure: "linear".to_string(),
            words_per_session: 1_500,
            words_per_chapter: 3_000,
            words_per_page: 300,
            summary_context_entries: 5,
            context_window_tokens: 200_000,
            session_timeout_minutes: 60,
            git_timeout_secs: 120,
            remote: "origin".to_string(),
        }
    }
}

impl BookConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_length == 0 {
            return Err(anyhow!("target_length must be > 0"));
        }
        if self.chapter_count == 0 {
            return Err(anyhow!("chapter_count must be > 0"));
        }
        if self.words_per_chapter == 0 {
            return Err(anyhow!("words_per_chapter must be > 0"));
        }
        if self.words_per_page == 0 {
            return Err(anyhow!("words_per_page must be > 0"));
        }
        if self.session_timeout_minutes == 0 {
            return Err(anyhow!("session_timeout_minutes must be > 0"));
        }
        if self.git_timeout_secs == 0 {
            return Err(anyhow!("git_timeout_secs must be > 0"));
        }
        if self.remote.trim().is_empty() {
            return Err(anyhow!("remote must be a non-empty string"));
        }
        Ok(())
    }
}

/// Load and validate config from a TOML file.
///
/// A missing file means the repository was never initialized.
pub fn load_config(path: &Path) -> Result<BookConfig> {
    if !path.exists() {
        return Err(EngineError::ConfigMissing {
            path: path.to_path_buf(),
        }
        .into());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BookConfig = toml::from_str(&contents).map_err(|err| EngineError::ConfigMalformed {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    cfg.validate().map_err(|err| EngineError::ConfigMalformed {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    debug!(path = %path.display(), target = cfg.target_length, "config loaded");
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
///
/// The engine itself never rewrites the config; repository seeding does.
pub fn write_config(path: &Path, cfg: &BookConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
