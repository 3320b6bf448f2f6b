//! Local filesystem port (driven/secondary port)
//!
//! Directory listing, entry creation/removal and file I/O on the local
//! tree. Every operation tolerates "already exists" and "already absent":
//! these are normal outcomes while the watcher and the poller race on the
//! same path.

use std::path::Path;

use crate::domain::LocalEntry;

/// Port trait for local filesystem operations
///
/// All paths are absolute.
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Lists the entries of a directory
    ///
    /// A missing directory yields an empty listing.
    async fn list_dir(&self, path: &Path) -> anyhow::Result<Vec<LocalEntry>>;

    /// Returns the entry at `path`, or `None` if nothing exists there
    async fn entry(&self, path: &Path) -> anyhow::Result<Option<LocalEntry>>;

    /// Creates a directory and its parents (`mkdir -p`)
    async fn create_dir(&self, path: &Path) -> anyhow::Result<()>;

    /// Removes a file, or a directory recursively
    ///
    /// Returns `Ok(false)` when the path was already absent.
    async fn remove(&self, path: &Path) -> anyhow::Result<bool>;

    /// Reads the entire contents of a file
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Replaces a file's contents atomically, creating parent directories
    async fn write_file(&self, path: &Path, data: &[u8]) -> anyhow::Result<()>;

    /// Sets a file's modification time (epoch milliseconds)
    async fn set_modified(&self, path: &Path, modified: i64) -> anyhow::Result<()>;
}
