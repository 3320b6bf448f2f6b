//! Remote storage port (driven/secondary port)
//!
//! Interface to the remote file-hosting backend. The engine addresses
//! everything by opaque [`RemoteId`]; names are only unique within a
//! parent by convention.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport and auth failures are
//!   adapter-specific.
//! - Deleting an id that no longer exists must succeed (`Ok(false)`), and
//!   uploading unchanged content must be harmless: the engine relies on
//!   these operations being idempotent instead of locking.

use std::path::Path;

use crate::domain::{RemoteEntry, RemoteId};

/// Port trait for remote storage operations
#[async_trait::async_trait]
pub trait IRemoteStorage: Send + Sync {
    /// Lists the children of a folder, excluding trashed entries
    async fn list_children(&self, folder_id: &RemoteId) -> anyhow::Result<Vec<RemoteEntry>>;

    /// Returns the modification time of an entry in epoch milliseconds
    ///
    /// `None` when the entry does not exist.
    async fn get_modified_time(&self, id: &RemoteId) -> anyhow::Result<Option<i64>>;

    /// Uploads a local file into `parent_id`
    ///
    /// Creates a new entry named after the local file when `existing_id` is
    /// `None`, otherwise replaces the content of `existing_id`.
    ///
    /// # Returns
    /// The id of the created or replaced entry
    async fn upload(
        &self,
        local_path: &Path,
        parent_id: &RemoteId,
        existing_id: Option<&RemoteId>,
    ) -> anyhow::Result<RemoteId>;

    /// Downloads an entry's content to `destination`
    ///
    /// Returns `Ok(false)` without writing anything when `id` is a folder
    /// or does not exist.
    async fn download(&self, id: &RemoteId, destination: &Path) -> anyhow::Result<bool>;

    /// Creates a folder named `name` under `parent_id`
    async fn create_folder(&self, name: &str, parent_id: &RemoteId) -> anyhow::Result<RemoteId>;

    /// Finds a non-trashed child of `parent_id` with exactly this name
    async fn find_by_name(&self, name: &str, parent_id: &RemoteId)
        -> anyhow::Result<Option<RemoteId>>;

    /// Deletes an entry (folders recursively)
    ///
    /// Returns `Ok(true)` if something was deleted and `Ok(false)` if the
    /// id was already gone.
    async fn delete(&self, id: &RemoteId) -> anyhow::Result<bool>;
}
