//! Checkpoint store implementation
//!
//! Provides file-based checkpoint persistence with atomic writes.

use super::types::Checkpoint;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default checkpoint location, relative to the working directory
pub const DEFAULT_CHECKPOINT_PATH: &str = ".import-checkpoint.json";

/// Persists one checkpoint document at a fixed path
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store for the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the checkpoint file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a checkpoint file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the checkpoint, `None` if there is none
    pub async fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.exists() {
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to read checkpoint file: {e}")))?;

        let checkpoint = serde_json::from_str(&contents)
            .map_err(|e| Error::checkpoint(format!("Failed to parse checkpoint file: {e}")))?;

        Ok(Some(checkpoint))
    }

    /// Overwrite the checkpoint document
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let contents = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| Error::checkpoint(format!("Failed to serialize checkpoint: {e}")))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to write checkpoint file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to rename checkpoint file: {e}")))?;

        debug!(
            "Checkpoint saved: batch {}/{}, {} urls",
            checkpoint.current_batch,
            checkpoint.total_batches,
            checkpoint.processed_urls.len()
        );
        Ok(())
    }

    /// Remove the checkpoint; returns whether one existed
    pub async fn delete(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::checkpoint(format!(
                "Failed to delete checkpoint file: {e}"
            ))),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name: OsString = self
            .path
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| OsString::from("checkpoint"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_PATH)
    }
}
