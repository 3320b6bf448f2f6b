//! MemoryRemote - in-process IRemoteStorage
//!
//! Keeps the whole remote tree in a map of nodes keyed by uuid ids. Used by
//! the engine tests to observe exactly which remote calls a pass issues.
//!
//! ## Design Notes
//!
//! - Modification times come from a settable clock rather than the wall
//!   clock, so tests can stage "remote is newer" scenarios precisely.
//! - Failure injection is by entry name: any mutating or transfer call that
//!   touches a failing name returns an error.
//! - Trashed nodes stay in the map but are invisible to every lookup.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use foldsync_core::domain::{RemoteEntry, RemoteId};
use foldsync_core::ports::IRemoteStorage;

use crate::RemoteError;

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<RemoteId>,
    is_folder: bool,
    modified_time: i64,
    content: Vec<u8>,
    trashed: bool,
}

/// Snapshot of how many mutating/transfer calls succeeded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub uploads: usize,
    pub downloads: usize,
    pub deletes: usize,
    pub folders_created: usize,
}

impl CallCounts {
    /// Total number of calls that changed either side
    pub fn total(&self) -> usize {
        self.uploads + self.downloads + self.deletes + self.folders_created
    }
}

/// In-memory remote store
#[derive(Debug)]
pub struct MemoryRemote {
    root: RemoteId,
    nodes: Mutex<HashMap<RemoteId, Node>>,
    failing: Mutex<HashSet<String>>,
    clock: AtomicI64,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
    deletes: AtomicUsize,
    folders_created: AtomicUsize,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Creates a store containing only an empty root folder
    pub fn new() -> Self {
        let root = RemoteId::from_static("root");
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            Node {
                name: String::new(),
                parent: None,
                is_folder: true,
                modified_time: 0,
                content: Vec::new(),
                trashed: false,
            },
        );
        Self {
            root,
            nodes: Mutex::new(nodes),
            failing: Mutex::new(HashSet::new()),
            clock: AtomicI64::new(1_000_000),
            uploads: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            folders_created: AtomicUsize::new(0),
        }
    }

    /// Id of the root folder
    pub fn root_id(&self) -> RemoteId {
        self.root.clone()
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    /// Current store time in epoch milliseconds
    pub fn now(&self) -> i64 {
        self.clock.load(Ordering::SeqCst)
    }

    /// Sets the time stamped on subsequent writes
    pub fn set_clock(&self, millis: i64) {
        self.clock.store(millis, Ordering::SeqCst);
    }

    /// Moves the store clock forward
    pub fn advance_clock(&self, millis: i64) {
        self.clock.fetch_add(millis, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Counters and failure injection
    // ------------------------------------------------------------------

    /// Counts of successful calls so far
    pub fn counts(&self) -> CallCounts {
        CallCounts {
            uploads: self.uploads.load(Ordering::SeqCst),
            downloads: self.downloads.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
            folders_created: self.folders_created.load(Ordering::SeqCst),
        }
    }

    /// Zeroes every counter
    pub fn reset_counts(&self) {
        self.uploads.store(0, Ordering::SeqCst);
        self.downloads.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
        self.folders_created.store(0, Ordering::SeqCst);
    }

    /// Makes every transfer or mutation touching `name` fail
    pub async fn fail_name(&self, name: &str) {
        self.failing.lock().await.insert(name.to_lowercase());
    }

    /// Removes all injected failures
    pub async fn clear_failures(&self) {
        self.failing.lock().await.clear();
    }

    async fn check_failure(&self, name: &str) -> Result<(), RemoteError> {
        if self.failing.lock().await.contains(&name.to_lowercase()) {
            return Err(RemoteError::Injected(name.to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Seeding and inspection helpers
    // ------------------------------------------------------------------

    /// Adds a file directly, without touching the counters
    pub async fn insert_file(
        &self,
        parent: &RemoteId,
        name: &str,
        content: &[u8],
        modified_time: i64,
    ) -> Result<RemoteId> {
        self.insert_node(parent, name, false, content.to_vec(), modified_time)
            .await
    }

    /// Adds a folder directly, without touching the counters
    pub async fn insert_folder(&self, parent: &RemoteId, name: &str) -> Result<RemoteId> {
        let now = self.now();
        self.insert_node(parent, name, true, Vec::new(), now).await
    }

    async fn insert_node(
        &self,
        parent: &RemoteId,
        name: &str,
        is_folder: bool,
        content: Vec<u8>,
        modified_time: i64,
    ) -> Result<RemoteId> {
        let id = RemoteId::new(Uuid::new_v4().to_string())?;
        self.nodes.lock().await.insert(
            id.clone(),
            Node {
                name: name.to_string(),
                parent: Some(parent.clone()),
                is_folder,
                modified_time,
                content,
                trashed: false,
            },
        );
        Ok(id)
    }

    /// Marks an entry as trashed so listings and lookups skip it
    pub async fn trash(&self, id: &RemoteId) {
        if let Some(node) = self.nodes.lock().await.get_mut(id) {
            node.trashed = true;
        }
    }

    /// Sets an entry's modification time
    pub async fn touch(&self, id: &RemoteId, modified_time: i64) {
        if let Some(node) = self.nodes.lock().await.get_mut(id) {
            node.modified_time = modified_time;
        }
    }

    /// Sorted names of the live children of `parent`
    pub async fn names_in(&self, parent: &RemoteId) -> Vec<String> {
        let nodes = self.nodes.lock().await;
        let mut names: Vec<String> = nodes
            .values()
            .filter(|n| !n.trashed && n.parent.as_ref() == Some(parent))
            .map(|n| n.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Content of a live file
    pub async fn content_of(&self, id: &RemoteId) -> Option<Vec<u8>> {
        let nodes = self.nodes.lock().await;
        nodes
            .get(id)
            .filter(|n| !n.trashed && !n.is_folder)
            .map(|n| n.content.clone())
    }

    /// Id of the live child of `parent` named `name` (exact match)
    pub async fn child_id(&self, parent: &RemoteId, name: &str) -> Option<RemoteId> {
        let nodes = self.nodes.lock().await;
        find_child(&nodes, parent, name)
    }
}

fn find_child(nodes: &HashMap<RemoteId, Node>, parent: &RemoteId, name: &str) -> Option<RemoteId> {
    nodes
        .iter()
        .find(|(_, n)| !n.trashed && n.parent.as_ref() == Some(parent) && n.name == name)
        .map(|(id, _)| id.clone())
}

fn live<'a>(nodes: &'a HashMap<RemoteId, Node>, id: &RemoteId) -> Option<&'a Node> {
    nodes.get(id).filter(|n| !n.trashed)
}

#[async_trait]
impl IRemoteStorage for MemoryRemote {
    async fn list_children(&self, folder_id: &RemoteId) -> Result<Vec<RemoteEntry>> {
        let nodes = self.nodes.lock().await;
        match live(&nodes, folder_id) {
            Some(node) if node.is_folder => {}
            Some(_) => return Err(RemoteError::WrongKind(folder_id.to_string()).into()),
            None => return Err(RemoteError::NotFound(folder_id.to_string()).into()),
        }
        Ok(nodes
            .iter()
            .filter(|(_, n)| !n.trashed && n.parent.as_ref() == Some(folder_id))
            .map(|(id, n)| RemoteEntry {
                id: id.clone(),
                name: n.name.clone(),
                is_folder: n.is_folder,
                modified_time: n.modified_time,
            })
            .collect())
    }

    async fn get_modified_time(&self, id: &RemoteId) -> Result<Option<i64>> {
        let nodes = self.nodes.lock().await;
        Ok(live(&nodes, id).map(|n| n.modified_time))
    }

    async fn upload(
        &self,
        local_path: &Path,
        parent_id: &RemoteId,
        existing_id: Option<&RemoteId>,
    ) -> Result<RemoteId> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RemoteError::InvalidId(local_path.display().to_string()))?
            .to_string();
        self.check_failure(&name).await?;

        let content = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("failed to read {}", local_path.display()))?;
        let now = self.now();

        let id = match existing_id {
            Some(id) => {
                let mut nodes = self.nodes.lock().await;
                let node = nodes
                    .get_mut(id)
                    .filter(|n| !n.trashed && !n.is_folder)
                    .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
                node.content = content;
                node.modified_time = now;
                id.clone()
            }
            None => {
                {
                    let nodes = self.nodes.lock().await;
                    if !live(&nodes, parent_id).is_some_and(|n| n.is_folder) {
                        return Err(RemoteError::NotFound(parent_id.to_string()).into());
                    }
                }
                self.insert_node(parent_id, &name, false, content, now).await?
            }
        };

        self.uploads.fetch_add(1, Ordering::SeqCst);
        debug!(id = %id, name = %name, "Memory upload");
        Ok(id)
    }

    async fn download(&self, id: &RemoteId, destination: &Path) -> Result<bool> {
        let (name, content) = {
            let nodes = self.nodes.lock().await;
            match live(&nodes, id) {
                Some(node) if !node.is_folder => (node.name.clone(), node.content.clone()),
                _ => return Ok(false),
            }
        };
        self.check_failure(&name).await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &content)
            .await
            .with_context(|| format!("failed to write {}", destination.display()))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn create_folder(&self, name: &str, parent_id: &RemoteId) -> Result<RemoteId> {
        self.check_failure(name).await?;
        {
            let nodes = self.nodes.lock().await;
            if !live(&nodes, parent_id).is_some_and(|n| n.is_folder) {
                return Err(RemoteError::NotFound(parent_id.to_string()).into());
            }
        }
        let id = self.insert_folder(parent_id, name).await?;
        self.folders_created.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn find_by_name(&self, name: &str, parent_id: &RemoteId) -> Result<Option<RemoteId>> {
        let nodes = self.nodes.lock().await;
        Ok(find_child(&nodes, parent_id, name))
    }

    async fn delete(&self, id: &RemoteId) -> Result<bool> {
        if *id == self.root {
            return Err(RemoteError::InvalidId("refusing to delete the root".into()).into());
        }
        let name = {
            let nodes = self.nodes.lock().await;
            match live(&nodes, id) {
                Some(node) => node.name.clone(),
                None => return Ok(false),
            }
        };
        self.check_failure(&name).await?;

        let mut nodes = self.nodes.lock().await;
        let mut doomed = vec![id.clone()];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i].clone();
            doomed.extend(
                nodes
                    .iter()
                    .filter(|(_, n)| n.parent.as_ref() == Some(&current))
                    .map(|(child, _)| child.clone()),
            );
            i += 1;
        }
        let removed = doomed.iter().filter(|d| nodes.remove(*d).is_some()).count();
        drop(nodes);

        if removed == 0 {
            return Ok(false);
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
