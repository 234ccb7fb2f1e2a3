//! Session lock file (`.ink-running`).
//!
//! The lock is advisory: it holds the RFC 3339 time it was taken and nothing
//! else. A lock older than the session timeout is presumed abandoned by a
//! crashed session and may be reclaimed. There is no heartbeat, so a live
//! session that outlasts the timeout looks exactly like a crashed one.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockInspection {
    Free,
    Live { age_secs: i64 },
    /// Older than the timeout, or unreadable (`age_secs` is `None`).
    Stale { age_secs: Option<i64> },
}

impl LockInspection {
    pub fn age_minutes(self) -> Option<i64> {
        match self {
            Self::Free | Self::Stale { age_secs: None } => None,
            Self::Live { age_secs } | Self::Stale { age_secs: Some(age_secs) } => {
                Some(age_secs / 60)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Acquired { stale_recovered: bool },
    Conflict { age_secs: i64 },
}

#[derive(Debug, Clone)]
pub struct SessionLock {
    path: PathBuf,
}

impl SessionLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Classify the current lock against `timeout_minutes`.
    ///
    /// A lock aged exactly the timeout is still live; one second more is stale.
    pub fn inspect(&self, timeout_minutes: u64, now: DateTime<Utc>) -> Result<LockInspection> {
        if !self.is_held() {
            return Ok(LockInspection::Free);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read lock {}", self.path.display()))?;
        let Ok(created) = DateTime::parse_from_rfc3339(raw.trim()) else {
            warn!(path = %self.path.display(), "lock timestamp unreadable; treating as stale");
            return Ok(LockInspection::Stale { age_secs: None });
        };

        let age_secs = (now - created.with_timezone(&Utc)).num_seconds().max(0);
        let timeout_secs = i64::try_from(timeout_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
        if age_secs > timeout_secs {
            Ok(LockInspection::Stale {
                age_secs: Some(age_secs),
            })
        } else {
            Ok(LockInspection::Live { age_secs })
        }
    }

    /// Take the lock, reclaiming it when stale.
    pub fn acquire(&self, timeout_minutes: u64, now: DateTime<Utc>) -> Result<Acquisition> {
        let stale_recovered = match self.inspect(timeout_minutes, now)? {
            LockInspection::Free => false,
            LockInspection::Live { age_secs } => {
                debug!(age_secs, "lock is live");
                return Ok(Acquisition::Conflict { age_secs });
            }
            LockInspection::Stale { age_secs } => {
                warn!(?age_secs, timeout_minutes, "reclaiming stale session lock");
                self.release()?;
                true
            }
        };

        fs::write(&self.path, now.to_rfc3339_opts(SecondsFormat::Secs, true))
            .with_context(|| format!("write lock {}", self.path.display()))?;
        debug!(path = %self.path.display(), stale_recovered, "lock acquired");
        Ok(Acquisition::Acquired { stale_recovered })
    }

    /// Remove the lock; a missing lock is not an error.
    pub fn release(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("remove lock {}", self.path.display()))
            }
        }
    }
}
