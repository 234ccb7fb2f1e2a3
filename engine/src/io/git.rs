//! Git adapter for the session engine.
//!
//! The engine treats git as an already-correct transport, so this wrapper
//! exposes a small fixed vocabulary of commands. Every command runs with a
//! wall-clock timeout and fails with [`EngineError::SyncFailure`].

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::error::EngineError;
use crate::io::process::{CommandOutput, run_command_with_timeout};

const GIT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Parsed `git status --porcelain -z` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file (the new path for renames).
    pub path: String,
}

impl StatusEntry {
    /// Removed from the working tree or the index.
    pub fn is_deletion(&self) -> bool {
        self.code.contains('D')
    }
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    remote: String,
    timeout: Duration,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>, remote: impl Into<String>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            remote: remote.into(),
            timeout,
        }
    }

    /// `<remote>/<branch>` as a revision.
    pub fn remote_ref(&self, branch: &str) -> String {
        format!("{}/{branch}", self.remote)
    }

    #[instrument(skip_all)]
    pub fn fetch(&self) -> Result<()> {
        debug!(remote = %self.remote, "fetching");
        self.run_checked(&["fetch", "--tags", &self.remote])?;
        Ok(())
    }

    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to run)"));
        }
        Ok(name)
    }

    pub fn head_sha(&self) -> Result<String> {
        Ok(self.run_capture(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        self.ref_exists(&format!("refs/remotes/{}/{branch}", self.remote))
    }

    pub fn tag_exists(&self, tag: &str) -> Result<bool> {
        self.ref_exists(&format!("refs/tags/{tag}"))
    }

    fn ref_exists(&self, full_ref: &str) -> Result<bool> {
        let out = self.run(&["rev-parse", "-q", "--verify", full_ref])?;
        Ok(out.success())
    }

    #[instrument(skip_all, fields(branch))]
    pub fn checkout(&self, branch: &str) -> Result<()> {
        debug!(branch, "checking out branch");
        self.run_checked(&["checkout", "-q", branch])?;
        Ok(())
    }

    /// Create or reset `branch` to `start` and check it out.
    #[instrument(skip_all, fields(branch, start))]
    pub fn checkout_reset(&self, branch: &str, start: &str) -> Result<()> {
        debug!(branch, start, "resetting and checking out branch");
        self.run_checked(&["checkout", "-q", "-B", branch, start])?;
        Ok(())
    }

    #[instrument(skip_all, fields(rev))]
    pub fn merge_ff_only(&self, rev: &str) -> Result<()> {
        debug!(rev, "fast-forward merge");
        self.run_checked(&["merge", "--ff-only", "-q", rev])?;
        Ok(())
    }

    /// Stage the given paths, including deletions.
    ///
    /// Paths missing from disk are removed from the index; untracked missing
    /// paths are ignored.
    pub fn stage_paths(&self, paths: &[String]) -> Result<()> {
        let (present, missing): (Vec<&String>, Vec<&String>) =
            paths.iter().partition(|p| self.workdir.join(p).exists());
        if !present.is_empty() {
            let mut args = vec!["add", "-A", "--"];
            args.extend(present.iter().map(|p| p.as_str()));
            self.run_checked(&args)?;
        }
        let missing: Vec<String> = missing.into_iter().cloned().collect();
        self.stage_removals(&missing)
    }

    /// Stage the deletion of `paths` while leaving the files on disk.
    pub fn stage_removals(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["rm", "--cached", "--ignore-unmatch", "-q", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run_checked(&args)?;
        Ok(())
    }

    /// Paths currently staged for commit.
    pub fn staged_paths(&self) -> Result<Vec<String>> {
        let out = self.run_capture(&["diff", "--cached", "--name-only", "-z"])?;
        Ok(split_nul(&out))
    }

    pub fn has_staged_changes(&self) -> Result<bool> {
        Ok(!self.staged_paths()?.is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!(message, "committing staged changes");
        self.run_checked(&["commit", "-q", "-m", message])?;
        Ok(true)
    }

    /// Status entries (including untracked files).
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-z", "-uall"])?;
        parse_status_z(&out)
    }

    /// Paths that differ between two revisions.
    pub fn diff_names(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let out = self.run_capture(&["diff", "--name-only", "-z", from, to])?;
        Ok(split_nul(&out))
    }

    #[instrument(skip_all, fields(tag))]
    pub fn create_tag(&self, tag: &str) -> Result<()> {
        debug!(tag, "creating tag");
        self.run_checked(&["tag", tag])?;
        Ok(())
    }

    /// Most recent tag named `<prefix>*`, by version order.
    pub fn latest_tag(&self, prefix: &str) -> Result<Option<String>> {
        let pattern = format!("{prefix}*");
        let out = self.run_capture(&["tag", "--list", &pattern, "--sort=-v:refname"])?;
        Ok(out.lines().map(str::trim).find(|l| !l.is_empty()).map(String::from))
    }

    /// Push each ref in order; stops at the first failure.
    #[instrument(skip_all)]
    pub fn push(&self, refs: &[&str]) -> Result<()> {
        for r in refs {
            debug!(remote = %self.remote, git_ref = *r, "pushing");
            self.run_checked(&["push", "-q", &self.remote, r])?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    pub fn force_push(&self, refs: &[&str]) -> Result<()> {
        for r in refs {
            warn!(remote = %self.remote, git_ref = *r, "force pushing");
            self.run_checked(&["push", "-q", "--force", &self.remote, r])?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(rev))]
    pub fn reset_hard(&self, rev: &str) -> Result<()> {
        warn!(rev, "hard reset");
        self.run_checked(&["reset", "-q", "--hard", rev])?;
        Ok(())
    }

    /// Point `branch` at `rev` without checking it out.
    pub fn branch_force(&self, branch: &str, rev: &str) -> Result<()> {
        self.run_checked(&["branch", "-f", branch, rev])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        Ok(self.run_checked(args)?.stdout_text())
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if !output.success() {
            let message = if output.timed_out {
                format!("timed out after {}s", self.timeout.as_secs())
            } else {
                output.stderr_text()
            };
            return Err(EngineError::SyncFailure {
                command: args.join(" "),
                message,
            }
            .into());
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0");
        run_command_with_timeout(cmd, self.timeout, GIT_OUTPUT_LIMIT_BYTES).map_err(|err| {
            EngineError::SyncFailure {
                command: args.join(" "),
                message: format!("{err:#}"),
            }
            .into()
        })
    }
}

fn split_nul(out: &str) -> Vec<String> {
    out.split('\0')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_status_z(out: &str) -> Result<Vec<StatusEntry>> {
    let mut entries = Vec::new();
    let mut items = out.split('\0').filter(|s| !s.is_empty());
    while let Some(item) = items.next() {
        if item.len() < 4 || !item.is_char_boundary(3) {
            return Err(anyhow!("unexpected porcelain entry: '{item}'"));
        }
        let code = item[..2].to_string();
        let path = item[3..].to_string();
        // Renames and copies are followed by their source path.
        if code.starts_with(['R', 'C']) {
            items.next();
        }
        entries.push(StatusEntry { code, path });
    }
    Ok(entries)
}
