//! Artifact storage
//!
//! The output directory doubles as the deduplication index: an artifact file
//! existing (and being non-empty) means its target is done and is never
//! fetched again. Writes go through a uniquely named temp file followed by a
//! rename, so readers and dedup checks never observe a partial artifact.

use crate::error::Result;
use crate::types::TargetKey;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed artifact store rooted at the output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. Call [`ensure`](Self::ensure) before
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the output directory if it does not exist yet.
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Artifact path for a key. Pure function of the key and the root.
    pub fn path_for(&self, key: &TargetKey) -> PathBuf {
        self.root.join(key.artifact_name())
    }

    /// Whether a completed artifact exists for this key.
    ///
    /// Zero-length files do not count: a crash between file creation and
    /// rename cannot produce one here, but an operator truncating a bad
    /// artifact by hand is a supported way to force a refetch.
    pub async fn contains(&self, key: &TargetKey) -> bool {
        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// Atomically write an artifact and return its final path.
    ///
    /// The temp file name carries a process-wide sequence number so two
    /// workers racing on the same key never write through the same temp path.
    pub async fn write(&self, key: &TargetKey, body: &[u8]) -> Result<PathBuf> {
        let final_path = self.path_for(key);
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp_path = self
            .root
            .join(format!(".{}.{seq}.part", key.artifact_name()));

        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        trace!(key = %key, path = %final_path.display(), bytes = body.len(), "artifact written");
        Ok(final_path)
    }
}
