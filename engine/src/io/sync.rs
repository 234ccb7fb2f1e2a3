//! Repository synchronizer: the git operations a session performs.
//!
//! Two branches are tracked. `main` is durable: it only ever receives whole
//! session boundaries. `draft` carries a session in progress. Pushes always go
//! durable first, then draft.

use std::fs;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::io::git::Git;
use crate::io::paths::{BookPaths, first_free_name, is_engine_owned};

pub const DURABLE_BRANCH: &str = "main";
pub const DRAFT_BRANCH: &str = "draft";
pub const SNAPSHOT_PREFIX: &str = "ink-";

/// Timestamp layout shared by snapshot tags and changelog file names.
pub const STAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

#[derive(Debug, Clone)]
pub struct Synchronizer {
    git: Git,
    paths: BookPaths,
}

impl Synchronizer {
    pub fn new(git: Git, paths: BookPaths) -> Self {
        Self { git, paths }
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Fetch and switch to the durable branch without merging, so local
    /// uncommitted edits are seen before the remote can touch them.
    #[instrument(skip_all)]
    pub fn prepare(&self) -> Result<()> {
        self.git.fetch()?;
        self.git.checkout(DURABLE_BRANCH)?;
        Ok(())
    }

    /// Commit files changed by collaborators since `since`, then merge the
    /// remote durable branch.
    ///
    /// Returns local edits plus paths the remote changed, sorted. With no
    /// recorded boundary every changed file counts.
    #[instrument(skip_all)]
    pub fn sync_external_edits(&self, since: Option<DateTime<Utc>>) -> Result<Vec<String>> {
        let mut candidates = Vec::new();
        for entry in self.git.status_porcelain()? {
            if is_engine_owned(&entry.path) {
                continue;
            }
            if entry.is_deletion() || self.modified_after(&entry.path, since)? {
                candidates.push(entry.path);
            }
        }
        debug!(candidates = candidates.len(), "external edit candidates");
        self.git.stage_paths(&candidates)?;

        let mut edits: Vec<String> = self
            .git
            .staged_paths()?
            .into_iter()
            .filter(|p| !is_engine_owned(p))
            .collect();

        let has_remote = self.git.remote_branch_exists(DURABLE_BRANCH)?;
        let remote_ref = self.git.remote_ref(DURABLE_BRANCH);
        if has_remote {
            for path in self.git.diff_names("HEAD", &remote_ref)? {
                if !is_engine_owned(&path) {
                    edits.push(path);
                }
            }
        }
        edits.sort();
        edits.dedup();

        if self.git.commit_staged("chore: external edits")? {
            info!(count = edits.len(), "committed external edits");
        }
        if has_remote {
            self.git.merge_ff_only(&remote_ref)?;
        }
        Ok(edits)
    }

    fn modified_after(&self, rel: &str, since: Option<DateTime<Utc>>) -> Result<bool> {
        let Some(since) = since else {
            return Ok(true);
        };
        let path = self.paths.root.join(rel);
        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("stat {}", path.display()))?;
        Ok(DateTime::<Utc>::from(modified) > since)
    }

    /// Tag the current head with a fresh, unique snapshot name.
    #[instrument(skip_all)]
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<String> {
        let base = format!("{SNAPSHOT_PREFIX}{}", now.format(STAMP_FORMAT));
        let tag = first_free_name(&base, |name| self.git.tag_exists(name))?;
        self.git.create_tag(&tag)?;
        info!(tag = %tag, "snapshot tag created");
        Ok(tag)
    }

    pub fn latest_snapshot(&self) -> Result<Option<String>> {
        self.git.latest_tag(SNAPSHOT_PREFIX)
    }

    /// Stage engine-owned and product paths and commit them if anything changed.
    pub fn commit_paths(&self, paths: &[String], message: &str) -> Result<bool> {
        self.git.stage_paths(paths)?;
        self.git.commit_staged(message)
    }

    /// Commit `paths` together with the removal of `released`. The released
    /// files stay on disk; callers delete them once the commit exists.
    pub fn commit_releasing(
        &self,
        paths: &[String],
        released: &[String],
        message: &str,
    ) -> Result<bool> {
        self.git.stage_paths(paths)?;
        self.git.stage_removals(released)?;
        self.git.commit_staged(message)
    }

    pub fn push_durable(&self) -> Result<()> {
        self.git.push(&[DURABLE_BRANCH])
    }

    pub fn push_durable_with_tag(&self, tag: &str) -> Result<()> {
        let tag_ref = format!("refs/tags/{tag}");
        self.git.push(&[DURABLE_BRANCH, &tag_ref])
    }

    /// Push durable then draft, so durable never references content the
    /// draft branch lacks.
    pub fn push_durable_then_draft(&self) -> Result<()> {
        self.git.push(&[DURABLE_BRANCH, DRAFT_BRANCH])
    }

    pub fn push_draft(&self) -> Result<()> {
        self.git.push(&[DRAFT_BRANCH])
    }

    /// Reset the draft branch to durable and check it out.
    pub fn enter_draft(&self) -> Result<()> {
        self.git.checkout_reset(DRAFT_BRANCH, DURABLE_BRANCH)
    }

    pub fn on_draft(&self) -> Result<bool> {
        Ok(self.git.current_branch()? == DRAFT_BRANCH)
    }

    /// Move durable to the current head, which must descend from it.
    pub fn promote_head(&self) -> Result<()> {
        if self.git.current_branch()? == DURABLE_BRANCH {
            return Ok(());
        }
        self.git.branch_force(DURABLE_BRANCH, "HEAD")
    }

    /// Move the draft branch to the durable head.
    pub fn align_draft(&self) -> Result<()> {
        if self.git.current_branch()? == DRAFT_BRANCH {
            return self.git.checkout_reset(DRAFT_BRANCH, DURABLE_BRANCH);
        }
        self.git.branch_force(DRAFT_BRANCH, DURABLE_BRANCH)
    }

    /// Hard-reset both branches to `tag` and force-push them.
    #[instrument(skip_all, fields(tag))]
    pub fn rollback(&self, tag: &str) -> Result<String> {
        self.git.checkout(DURABLE_BRANCH)?;
        self.git.reset_hard(tag)?;
        self.git.branch_force(DRAFT_BRANCH, tag)?;
        self.git.force_push(&[DURABLE_BRANCH, DRAFT_BRANCH])?;
        let head = self.git.head_sha()?;
        info!(tag, head = %head, "rolled back");
        Ok(head)
    }
}
