//! Transient per-path bookkeeping shared by the watcher and poller paths
//!
//! Three sets, all keyed by the lowercased full local path so equal names in
//! different folders never shadow each other:
//!
//! - **recently uploaded**: paths uploaded within the suppression window;
//!   per-file checks and local cleanup leave them alone while remote
//!   metadata catches up
//! - **pending deletion**: paths whose remote counterpart still has to be
//!   deleted; flushed by the next reconciliation pass of the parent folder
//! - **deleted locally**: paths whose local deletion is being propagated;
//!   download paths skip them so a poll cannot resurrect the file
//!
//! Entries in the recently-uploaded set expire lazily on lookup. The clock
//! is `tokio::time::Instant`, so tests can drive it with a paused runtime.

use std::path::Path;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::time::Instant;
use tracing::debug;

/// Lowercased full-path key used by every set
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Concurrent transient sets; see the module docs
#[derive(Debug)]
pub struct SyncTracker {
    recently_uploaded: DashMap<String, Instant>,
    pending_deletion: DashSet<String>,
    deleted_locally: DashSet<String>,
    suppression_window: Duration,
}

impl SyncTracker {
    /// Creates empty sets with the given suppression window
    pub fn new(suppression_window: Duration) -> Self {
        Self {
            recently_uploaded: DashMap::new(),
            pending_deletion: DashSet::new(),
            deleted_locally: DashSet::new(),
            suppression_window,
        }
    }

    // ------------------------------------------------------------------
    // Recently uploaded
    // ------------------------------------------------------------------

    /// Starts (or restarts) the suppression window for `path`
    pub fn mark_uploaded(&self, path: &Path) {
        self.recently_uploaded.insert(path_key(path), Instant::now());
    }

    /// Whether `path` was uploaded inside the suppression window
    pub fn is_recently_uploaded(&self, path: &Path) -> bool {
        let key = path_key(path);
        let expired = match self.recently_uploaded.get(&key) {
            Some(at) => at.elapsed() >= self.suppression_window,
            None => return false,
        };
        if expired {
            self.recently_uploaded.remove(&key);
            debug!(path = %path.display(), "Upload suppression window elapsed");
        }
        !expired
    }

    // ------------------------------------------------------------------
    // Pending deletion
    // ------------------------------------------------------------------

    /// Queues the remote counterpart of `path` for deletion
    pub fn queue_deletion(&self, path: &Path) {
        self.pending_deletion.insert(path_key(path));
    }

    /// Whether the remote counterpart of `path` awaits deletion
    pub fn is_pending_deletion(&self, path: &Path) -> bool {
        self.pending_deletion.contains(&path_key(path))
    }

    /// Drops `path` from the pending-deletion queue
    pub fn clear_pending_deletion(&self, path: &Path) -> bool {
        self.pending_deletion.remove(&path_key(path)).is_some()
    }

    /// Number of queued remote deletions
    pub fn pending_deletion_count(&self) -> usize {
        self.pending_deletion.len()
    }

    /// Drops queued deletions directly inside `folder` whose lowercased
    /// name fails `keep`; returns how many were dropped
    pub fn retain_pending_in(&self, folder: &Path, keep: impl Fn(&str) -> bool) -> usize {
        let folder = path_key(folder);
        let before = self.pending_deletion.len();
        self.pending_deletion.retain(|key| {
            let key = Path::new(key);
            let inside = key.parent() == Some(Path::new(&folder));
            match key.file_name().and_then(|n| n.to_str()) {
                Some(name) if inside => keep(name),
                _ => true,
            }
        });
        before.saturating_sub(self.pending_deletion.len())
    }

    // ------------------------------------------------------------------
    // Deleted locally
    // ------------------------------------------------------------------

    /// Records that the local file at `path` is being deleted
    pub fn mark_deleted_locally(&self, path: &Path) {
        self.deleted_locally.insert(path_key(path));
    }

    /// Whether a local deletion of `path` is in flight
    pub fn is_deleted_locally(&self, path: &Path) -> bool {
        self.deleted_locally.contains(&path_key(path))
    }

    /// Forgets the in-flight deletion of `path` (it was recreated)
    pub fn clear_deleted_locally(&self, path: &Path) -> bool {
        self.deleted_locally.remove(&path_key(path)).is_some()
    }

    /// Forgets every in-flight local deletion
    pub fn clear_all_deleted_locally(&self) {
        self.deleted_locally.clear();
    }
}
