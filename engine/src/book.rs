//! Handle on one book repository, shared by the operation modules.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::session::{SessionEvent, SessionPhase};
use crate::error::EngineError;
use crate::io::config::{BookConfig, load_config};
use crate::io::git::Git;
use crate::io::lock::SessionLock;
use crate::io::paths::BookPaths;
use crate::io::state::{ChapterState, load_state};
use crate::io::sync::Synchronizer;

#[derive(Debug, Clone)]
pub struct Book {
    pub paths: BookPaths,
    pub config: BookConfig,
    pub lock: SessionLock,
    pub sync: Synchronizer,
}

impl Book {
    /// Load config from the working tree and wire up the git adapter.
    pub fn open(root: &Path) -> Result<Self> {
        let paths = BookPaths::new(root);
        let config = load_config(&paths.config_path)?;
        let git = Git::new(
            root,
            config.remote.clone(),
            Duration::from_secs(config.git_timeout_secs),
        );
        Ok(Self {
            lock: SessionLock::new(paths.lock_path.clone()),
            sync: Synchronizer::new(git, paths.clone()),
            paths,
            config,
        })
    }

    /// Re-read config after the working tree changed under us.
    pub fn reload_config(&mut self) -> Result<()> {
        self.config = load_config(&self.paths.config_path)?;
        Ok(())
    }

    pub fn load_state(&self) -> Result<ChapterState> {
        load_state(&self.paths.state_path).context("load chapter state")
    }

    /// Phase as observed on disk right now.
    pub fn phase(&self) -> SessionPhase {
        SessionPhase::observe(self.lock.is_held(), self.paths.is_sealed())
    }

    pub fn ensure_not_sealed(&self) -> Result<()> {
        if self.paths.is_sealed() {
            return Err(EngineError::AlreadySealed.into());
        }
        Ok(())
    }

    /// Drive `event` from the observed phase, mapping a rejected transition to
    /// the error the caller should see.
    pub fn transition(&self, event: SessionEvent) -> Result<SessionPhase> {
        let phase = self.phase();
        phase.on(event).map_err(|err| {
            let typed = match (phase, event) {
                (SessionPhase::Sealed, _) => EngineError::AlreadySealed,
                (_, SessionEvent::CloseRequested) => EngineError::NoActiveSession,
                _ => return anyhow::Error::new(err),
            };
            anyhow::Error::new(typed).context(err)
        })
    }
}
