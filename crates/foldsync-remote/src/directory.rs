//! DirectoryRemote - IRemoteStorage over a plain directory
//!
//! Treats a directory (typically a network or removable mount) as the remote
//! store. Ids are `/`-separated paths relative to the store root, with `/`
//! naming the root itself, so they stay stable across restarts.
//!
//! ## Design Notes
//!
//! - Writes go through a sibling temporary file and a rename; temporaries are
//!   hidden from listings, which is how in-flight uploads stay "trashed".
//! - Ids containing `..` or empty components are rejected before touching
//!   the filesystem.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

use foldsync_core::domain::{
    is_temp_path, system_time_to_millis, temp_path_for, validate_entry_name, RemoteEntry, RemoteId,
};
use foldsync_core::ports::IRemoteStorage;

use crate::RemoteError;

/// Remote store rooted at a local directory
#[derive(Debug, Clone)]
pub struct DirectoryRemote {
    root: PathBuf,
}

impl DirectoryRemote {
    /// Creates a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The id of the store root
    pub fn root_id() -> RemoteId {
        RemoteId::from_static("/")
    }

    /// Directory backing the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &RemoteId) -> Result<PathBuf, RemoteError> {
        let rel = id.as_str().trim_start_matches('/');
        let mut path = self.root.clone();
        if rel.is_empty() {
            return Ok(path);
        }
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(part) => path.push(part),
                _ => return Err(RemoteError::InvalidId(id.to_string())),
            }
        }
        Ok(path)
    }

    fn child_id(parent: &RemoteId, name: &str) -> Result<RemoteId> {
        let parent = parent.as_str().trim_end_matches('/');
        Ok(RemoteId::new(format!("{parent}/{name}"))?)
    }

    async fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
        let tmp = temp_path_for(target);
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("failed to replace {}", target.display()));
        }
        Ok(())
    }
}

async fn metadata_if_exists(path: &Path) -> Result<Option<std::fs::Metadata>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to stat {}", path.display())),
    }
}

#[async_trait]
impl IRemoteStorage for DirectoryRemote {
    #[instrument(skip(self), fields(folder = %folder_id))]
    async fn list_children(&self, folder_id: &RemoteId) -> Result<Vec<RemoteEntry>> {
        let dir = self.resolve(folder_id)?;
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RemoteError::NotFound(folder_id.to_string()).into())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to list {}", dir.display()))
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if is_temp_path(&path) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                debug!(path = %path.display(), "Skipping non UTF-8 name");
                continue;
            };
            // The entry may vanish between readdir and stat
            let Some(meta) = metadata_if_exists(&path).await? else {
                continue;
            };
            let modified_time = meta.modified().map(system_time_to_millis).unwrap_or(0);
            entries.push(RemoteEntry {
                id: Self::child_id(folder_id, &name)?,
                name,
                is_folder: meta.is_dir(),
                modified_time,
            });
        }

        debug!(count = entries.len(), "Listed remote folder");
        Ok(entries)
    }

    async fn get_modified_time(&self, id: &RemoteId) -> Result<Option<i64>> {
        let path = self.resolve(id)?;
        Ok(metadata_if_exists(&path)
            .await?
            .map(|meta| meta.modified().map(system_time_to_millis).unwrap_or(0)))
    }

    #[instrument(skip(self), fields(local = %local_path.display(), parent = %parent_id))]
    async fn upload(
        &self,
        local_path: &Path,
        parent_id: &RemoteId,
        existing_id: Option<&RemoteId>,
    ) -> Result<RemoteId> {
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("failed to read {}", local_path.display()))?;

        let id = match existing_id {
            Some(id) => id.clone(),
            None => {
                let name = local_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| RemoteError::InvalidId(local_path.display().to_string()))?;
                Self::child_id(parent_id, name)?
            }
        };

        let target = self.resolve(&id)?;
        if let Some(meta) = metadata_if_exists(&target).await? {
            if meta.is_dir() {
                return Err(RemoteError::WrongKind(id.to_string()).into());
            }
        }
        Self::write_atomic(&target, &data).await?;
        debug!(id = %id, bytes = data.len(), "Uploaded");
        Ok(id)
    }

    #[instrument(skip(self), fields(id = %id, destination = %destination.display()))]
    async fn download(&self, id: &RemoteId, destination: &Path) -> Result<bool> {
        let source = self.resolve(id)?;
        match metadata_if_exists(&source).await? {
            Some(meta) if meta.is_file() => {}
            Some(_) => {
                debug!("Refusing to download a folder");
                return Ok(false);
            }
            None => return Ok(false),
        }

        let data = tokio::fs::read(&source)
            .await
            .with_context(|| format!("failed to read {}", source.display()))?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Self::write_atomic(destination, &data).await?;
        Ok(true)
    }

    async fn create_folder(&self, name: &str, parent_id: &RemoteId) -> Result<RemoteId> {
        validate_entry_name(name)?;
        let id = Self::child_id(parent_id, name)?;
        let path = self.resolve(&id)?;
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(id)
    }

    async fn find_by_name(&self, name: &str, parent_id: &RemoteId) -> Result<Option<RemoteId>> {
        if validate_entry_name(name).is_err() {
            return Ok(None);
        }
        let id = Self::child_id(parent_id, name)?;
        let path = self.resolve(&id)?;
        Ok(metadata_if_exists(&path).await?.map(|_| id))
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &RemoteId) -> Result<bool> {
        let path = self.resolve(id)?;
        if path == self.root {
            return Err(RemoteError::InvalidId("refusing to delete the store root".into()).into());
        }
        let result = match metadata_if_exists(&path).await? {
            Some(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Some(_) => tokio::fs::remove_file(&path).await,
            None => return Ok(false),
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.display())),
        }
    }
}
