//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: Uses write-to-temp + rename to avoid partial writes
//!   on crash or power loss. Temporaries carry the `.foldsync-tmp` suffix
//!   and are hidden from listings.
//! - **Tolerant removal**: Removing an absent path reports `false` instead of
//!   failing, since the watcher and the poller can race on the same entry.
//! - **Modification times**: Set through `std::fs::File::set_times` on a
//!   blocking thread so downloaded files carry the remote timestamp.

use std::fs::FileTimes;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use foldsync_core::domain::{is_temp_path, system_time_to_millis, temp_path_for, LocalEntry};
use foldsync_core::ports::ILocalFileSystem;
use tracing::{debug, instrument};

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations take absolute paths.
/// Configuration (e.g. sync root) lives at a higher layer.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn entry_from_metadata(path: &Path, metadata: &std::fs::Metadata) -> Option<LocalEntry> {
    let name = path.file_name()?.to_str()?.to_string();
    let last_modified = metadata.modified().map(system_time_to_millis).unwrap_or(0);
    Some(LocalEntry {
        path: path.to_path_buf(),
        name,
        last_modified,
        is_directory: metadata.is_dir(),
    })
}

fn millis_to_system_time(millis: i64) -> SystemTime {
    if millis >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_millis(millis.unsigned_abs())
    } else {
        SystemTime::UNIX_EPOCH
    }
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn list_dir(&self, path: &Path) -> anyhow::Result<Vec<LocalEntry>> {
        let mut read_dir = match tokio::fs::read_dir(path).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("directory missing, empty listing");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read directory: {}", path.display()))
            }
        };

        let mut entries = Vec::new();
        while let Some(dir_entry) = read_dir.next_entry().await? {
            let entry_path = dir_entry.path();
            if is_temp_path(&entry_path) {
                continue;
            }
            // Entries can disappear between readdir and stat.
            let metadata = match dir_entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match entry_from_metadata(&entry_path, &metadata) {
                Some(entry) => entries.push(entry),
                None => debug!(path = %entry_path.display(), "skipping non UTF-8 name"),
            }
        }

        debug!(count = entries.len(), "directory listed");
        Ok(entries)
    }

    async fn entry(&self, path: &Path) -> anyhow::Result<Option<LocalEntry>> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(entry_from_metadata(path, &metadata)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_dir(&self, path: &Path) -> anyhow::Result<()> {
        debug!("creating directory");
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove(&self, path: &Path) -> anyhow::Result<bool> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("already absent");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let result = if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(path).await
        } else {
            debug!("removing file");
            tokio::fs::remove_file(path).await
        };

        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove: {}", path.display())),
        }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self, data), fields(path = %path.display(), bytes = data.len()))]
    async fn write_file(&self, path: &Path, data: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Same directory, so the rename stays on one filesystem.
        let tmp_path = temp_path_for(path);
        debug!(?tmp_path, "writing to temporary file");
        tokio::fs::write(&tmp_path, data).await?;

        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!("write complete");
        Ok(())
    }

    async fn set_modified(&self, path: &Path, modified: i64) -> anyhow::Result<()> {
        let owned = path.to_path_buf();
        let time = millis_to_system_time(modified);
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let file = std::fs::File::options().write(true).open(&owned)?;
            file.set_times(FileTimes::new().set_modified(time))
        })
        .await?
        .with_context(|| format!("Failed to set modification time: {}", path.display()))
    }
}

// ============================================================================
// Unit tests
// ============================================================================
