//! Resume checkpoint persistence
//!
//! The checkpoint records the last fully drained enumeration unit. It is
//! written atomically (temp file then rename) so a crash mid-write leaves the
//! previous checkpoint intact. The checkpoint is an optimization only: the
//! artifact store is the source of truth for what has been fetched, so a
//! missing or corrupt checkpoint just means re-enumerating from the start
//! with every existing artifact skipped.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persistent resume state for one harvest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last fully drained enumeration unit (1-based; 0 = nothing drained)
    pub cursor: u64,
    /// Best-known total unit count, if the source advertises one
    pub expected_total: Option<u64>,
    /// Cumulative terminal outcomes across all runs, including skips
    pub completed: u64,
    /// When this checkpoint was written
    pub updated_at: DateTime<Utc>,
}

/// Loads and atomically saves [`Checkpoint`]s at a fixed path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path the checkpoint is persisted at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint, treating a missing or unreadable file as absent.
    pub async fn load(&self) -> Option<Checkpoint> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no checkpoint to resume from");
                return None;
            }
        };
        match serde_json::from_slice::<Checkpoint>(&bytes) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "checkpoint file is corrupt, starting from the beginning"
                );
                None
            }
        }
    }

    /// Atomically persist the checkpoint (write to a temp file, then rename).
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(
            cursor = checkpoint.cursor,
            completed = checkpoint.completed,
            "checkpoint saved"
        );
        Ok(())
    }
}
