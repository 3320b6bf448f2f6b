//! JSON file snapshot store
//!
//! The whole baseline is one JSON document. Saves write a sibling temporary
//! file and rename it over the target so a crash mid-write leaves the
//! previous snapshot intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use foldsync_core::domain::{temp_path_for, SyncStateSnapshot};
use foldsync_core::ports::ISyncStateStore;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::StateStoreError;

/// Durable snapshot store backed by a single JSON file
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    // Serializes concurrent saves so two passes never share the temp file.
    write_lock: Mutex<()>,
}

impl JsonStateStore {
    /// Creates a store persisting to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_atomic(&self, bytes: &[u8]) -> Result<(), StateStoreError> {
        let io_err = |source| StateStoreError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let tmp_path = temp_path_for(&self.path);
        tokio::fs::write(&tmp_path, bytes).await.map_err(io_err)?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(e));
        }
        Ok(())
    }
}

#[async_trait]
impl ISyncStateStore for JsonStateStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> SyncStateSnapshot {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No sync state file, starting with an empty baseline");
                return SyncStateSnapshot::new();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read sync state, starting with an empty baseline");
                return SyncStateSnapshot::new();
            }
        };

        match SyncStateSnapshot::from_json(&bytes) {
            Ok(snapshot) => {
                debug!(folders = snapshot.len(), "Loaded sync state");
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "Sync state is corrupt, starting with an empty baseline");
                SyncStateSnapshot::new()
            }
        }
    }

    #[instrument(skip(self, snapshot), fields(path = %self.path.display(), folders = snapshot.len()))]
    async fn save(&self, snapshot: &SyncStateSnapshot) -> anyhow::Result<()> {
        let bytes = snapshot
            .to_json()
            .map_err(|e| StateStoreError::SerializationError(e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        self.write_atomic(&bytes).await?;
        debug!("Saved sync state");
        Ok(())
    }
}
