//! Batch persistence
//!
//! Writes a collected batch as one pretty-printed JSON array and reads it
//! back. Writes go through a sibling temp file and an atomic rename, so a
//! reader never observes a torn artifact and a failed run cannot clobber
//! the previous good one.

use crate::error::{Error, PersistenceError, Result};
use crate::types::CollectedBatch;
use std::path::{Path, PathBuf};

/// Reads and writes the JSON batch artifact at a fixed path
#[derive(Debug, Clone)]
pub struct ResolutionStore {
    artifact_path: PathBuf,
}

impl ResolutionStore {
    /// Store bound to the given artifact path
    pub fn new(artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
        }
    }

    /// Where the artifact lives
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Persist the batch, replacing any previous artifact atomically.
    ///
    /// An empty batch still produces a valid `[]` artifact; "ran and found
    /// nothing" must be distinguishable from "never ran".
    pub async fn persist(&self, batch: &CollectedBatch) -> Result<()> {
        if let Some(parent) = self.artifact_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PersistenceError::CreateDir {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;
        }

        let json = serde_json::to_vec_pretty(batch).map_err(Error::Serialization)?;

        // Temp file lives next to the artifact so the rename stays on one
        // filesystem.
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &json)
            .await
            .map_err(|e| PersistenceError::TempWrite {
                path: temp_path.clone(),
                reason: e.to_string(),
            })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &self.artifact_path).await {
            // Best effort; the stray temp file is harmless if this fails too
            tokio::fs::remove_file(&temp_path).await.ok();
            return Err(PersistenceError::Commit {
                from: temp_path,
                to: self.artifact_path.clone(),
                reason: e.to_string(),
            }
            .into());
        }

        tracing::info!(
            path = %self.artifact_path.display(),
            records = batch.len(),
            "Persisted batch artifact"
        );
        Ok(())
    }

    /// Load a previously persisted batch
    pub async fn load(&self) -> Result<CollectedBatch> {
        let json = tokio::fs::read_to_string(&self.artifact_path)
            .await
            .map_err(Error::Io)?;
        serde_json::from_str(&json).map_err(Error::Serialization)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .artifact_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.artifact_path.with_file_name(name)
    }
}
