//! Test-only helpers: a seeded book repository with a local bare remote.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use tempfile::TempDir;

use crate::io::config::{BookConfig, write_config};
use crate::io::paths::BookPaths;

/// Fixed clock for deterministic tags, changelog names and lock ages.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Config used by [`TestRepo::new`]: small pages and chapters so scenarios
/// cross boundaries with a few paragraphs.
pub fn small_config() -> BookConfig {
    BookConfig {
        target_length: 200,
        chapter_count: 3,
        words_per_chapter: 40,
        words_per_page: 10,
        ..BookConfig::default()
    }
}

/// Working clone of a book plus the bare repository it pushes to.
pub struct TestRepo {
    _temp: TempDir,
    root: PathBuf,
    remote: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        Self::with_config(&small_config())
    }

    pub fn with_config(config: &BookConfig) -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let remote = temp.path().join("remote.git");
        let root = temp.path().join("book");
        fs::create_dir_all(&remote).context("create remote dir")?;
        fs::create_dir_all(&root).context("create book dir")?;

        git_in(&remote, &["init", "--bare", "-b", "main"])?;
        git_in(&root, &["init", "-b", "main"])?;
        git_in(&root, &["config", "user.email", "test@example.com"])?;
        git_in(&root, &["config", "user.name", "test"])?;
        let remote_arg = remote.to_string_lossy().into_owned();
        git_in(&root, &["remote", "add", "origin", &remote_arg])?;

        let repo = Self {
            _temp: temp,
            root,
            remote,
        };
        repo.seed_book(config)?;
        repo.git(&["add", "-A"])?;
        repo.git(&["commit", "-m", "chore: seed book"])?;
        repo.git(&["push", "-u", "origin", "main"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> BookPaths {
        BookPaths::new(&self.root)
    }

    fn seed_book(&self, config: &BookConfig) -> Result<()> {
        let paths = self.paths();
        write_config(&paths.config_path, config)?;
        self.write(
            "Global Material/Characters.md",
            "Mara Quell, lighthouse keeper. Tobin, her brother.\n",
        )?;
        self.write(
            "Global Material/Summary.md",
            "Mara arrives on the island after the storm has cut the ferry line to the mainland.\n",
        )?;
        self.write(
            "Chapters material/Chapter_01.md",
            "Mara finds the lamp room door forced open.\n",
        )?;
        self.write("Review/current.md", "")?;
        Ok(())
    }

    /// Write a file relative to the book root, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.root.join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root.join(rel).exists()
    }

    /// Plant a lock taken `age` before `now`.
    pub fn plant_lock(&self, now: DateTime<Utc>, age: Duration) -> Result<()> {
        let stamp = (now - age).to_rfc3339_opts(SecondsFormat::Secs, true);
        self.write(crate::io::paths::LOCK_FILE, &stamp)
    }

    /// Run git in the working clone and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        git_in(&self.root, args)
    }

    /// Run git against the bare remote and return trimmed stdout.
    pub fn remote_git(&self, args: &[&str]) -> Result<String> {
        git_in(&self.remote, args)
    }

    pub fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Subject line of the latest commit on `rev`.
    pub fn last_subject(&self, rev: &str) -> Result<String> {
        self.git(&["log", "-1", "--format=%s", rev])
    }

    pub fn tags(&self) -> Result<Vec<String>> {
        Ok(self
            .git(&["tag", "--list"])?
            .lines()
            .map(String::from)
            .collect())
    }

    /// Second clone of the remote, for edits pushed from another machine.
    pub fn clone_remote(&self, name: &str) -> Result<PathBuf> {
        let parent = self
            .root
            .parent()
            .context("book root has no parent directory")?;
        let dest = parent.join(name);
        let remote_arg = self.remote.to_string_lossy().into_owned();
        let dest_arg = dest.to_string_lossy().into_owned();
        git_in(parent, &["clone", "-b", "main", &remote_arg, &dest_arg])?;
        git_in(&dest, &["config", "user.email", "other@example.com"])?;
        git_in(&dest, &["config", "user.name", "other"])?;
        Ok(dest)
    }
}

/// Run git in `dir`, failing with stderr on a non-zero exit.
pub fn git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
