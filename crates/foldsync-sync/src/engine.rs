//! Folder synchronization engine
//!
//! The [`SyncEngine`] keeps a local directory tree and a remote folder tree
//! mutually consistent. It has no transaction log: intent is inferred from
//! two listings plus the persisted baseline of names that were in sync when
//! each folder's last pass completed.
//!
//! ## Reconciliation pass (one folder)
//!
//! 1. List remote and local children, keyed by lowercase name
//! 2. Read the folder's baseline `S`
//! 3. **Deletions**: a name in `S` missing on one side is deleted on the other
//! 4. **Uploads**: local names in neither the remote listing nor `S` are new;
//!    folders are created remotely and recursed into, files are uploaded
//! 5. Re-list remote children
//! 6. **Pending-deletion flush**: queued remote deletions still present are
//!    deleted now
//! 7. **Downloads**: remote names in neither the local listing nor `S` are
//!    new; folders are created locally and recursed into, files downloaded
//! 8. The new baseline is the union of names present on either side, and the
//!    whole snapshot is persisted
//!
//! Subfolders present on both sides are then reconciled depth-first.
//!
//! ## Failure handling
//!
//! Every remote or local call may fail. A failure only aborts the step for
//! that name: it is logged, counted in the [`SyncReport`], and the pass
//! continues. Names whose transfer failed are left out of the new baseline
//! so the next pass treats them as new again; names whose deletion failed
//! stay in it so the deletion is retried. A listing failure abandons the
//! folder without touching its baseline.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use foldsync_core::config::Config;
use foldsync_core::domain::{
    is_temp_path, now_millis, LocalEntry, NameKey, RemoteEntry, RemoteId, SyncStateSnapshot,
};
use foldsync_core::ports::{ILocalFileSystem, IRemoteStorage, ISyncStateStore};

use crate::policy::{FileDecision, TimestampPolicy, DEFAULT_CONFLICT_THRESHOLD_MS};
use crate::tracker::SyncTracker;
use crate::SyncError;

// ============================================================================
// Settings
// ============================================================================

/// Engine parameters derived from configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Root of the local tree
    pub local_root: PathBuf,
    /// Remote folder mirroring `local_root`
    pub remote_root_id: RemoteId,
    /// Baseline file name, excluded from every listing
    pub state_file_name: String,
    /// Skew tolerance for per-file timestamp checks
    pub conflict_threshold_ms: i64,
    /// How long a fresh upload is exempt from per-file checks and cleanup
    pub upload_suppression: Duration,
}

impl EngineSettings {
    /// Settings with default threshold and suppression window
    pub fn new(local_root: impl Into<PathBuf>, remote_root_id: RemoteId) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root_id,
            state_file_name: ".sync_state.json".to_string(),
            conflict_threshold_ms: DEFAULT_CONFLICT_THRESHOLD_MS,
            upload_suppression: Duration::from_secs(10),
        }
    }

    /// Builds settings from the `sync` section of the configuration
    ///
    /// # Errors
    /// Returns an error if the configured remote root id is invalid
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Ok(Self {
            local_root: config.sync.local_root.clone(),
            remote_root_id: RemoteId::new(config.sync.remote_root_id.clone())?,
            state_file_name: config.sync.state_file_name.clone(),
            conflict_threshold_ms: i64::try_from(config.sync.conflict_threshold_ms)
                .unwrap_or(i64::MAX),
            upload_suppression: Duration::from_secs(config.sync.upload_suppression_secs),
        })
    }
}

// ============================================================================
// Reports and outcomes
// ============================================================================

/// Summary of one engine operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files uploaded (created or replaced remotely)
    pub uploads: u32,
    /// Files downloaded
    pub downloads: u32,
    /// Remote entries deleted
    pub remote_deletions: u32,
    /// Local entries deleted
    pub local_deletions: u32,
    /// Folders created on either side
    pub folders_created: u32,
    /// Non-fatal errors, one per failed step
    pub errors: Vec<String>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Number of changes applied to either side
    pub fn total_changes(&self) -> u32 {
        self.uploads
            + self.downloads
            + self.remote_deletions
            + self.local_deletions
            + self.folders_created
    }

    /// True when no step failed
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds another report's counts and errors (durations are not summed)
    pub fn merge(&mut self, other: SyncReport) {
        self.uploads += other.uploads;
        self.downloads += other.downloads;
        self.remote_deletions += other.remote_deletions;
        self.local_deletions += other.local_deletions;
        self.folders_created += other.folders_created;
        self.errors.extend(other.errors);
    }

    fn record_error(&mut self, message: String) {
        warn!(error = %message, "Sync step failed");
        self.errors.push(message);
    }
}

/// Result of a watcher-triggered single-file check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSyncOutcome {
    /// Inside the post-upload suppression window; nothing checked
    Suppressed,
    /// Absent remotely; uploaded as a new entry
    Uploaded,
    /// Local copy newer beyond the threshold; remote content replaced
    Replaced,
    /// Timestamps within the threshold
    InSync,
    /// Remote copy newer; deliberately left alone
    RemoteNewer,
    /// Not a syncable file (directory, state file, outside root, vanished,
    /// or parent folder not known remotely yet)
    Skipped,
    /// A remote or local call failed
    Failed,
}

/// Result of propagating one local deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The remote counterpart was deleted
    RemoteDeleted,
    /// No remote counterpart existed
    AlreadyAbsent,
    /// The counterpart could not be resolved or deleted; queued for the
    /// next reconciliation pass
    Queued,
    /// Not a path this engine synchronizes
    Skipped,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Baseline key of `name` inside the folder keyed `parent`
fn child_key(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

type PassFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Bidirectional folder synchronization engine
///
/// One instance per process, shared as `Arc<SyncEngine>` between the watcher
/// dispatcher and the poller loops. All mutable state lives in concurrent
/// maps; there is no engine-wide lock, so correctness rests on the remote
/// operations being idempotent.
///
/// ## Dependencies
///
/// - `remote`: Remote folder/file operations
/// - `local_fs`: Local directory listing and removal
/// - `state_store`: Baseline persistence
pub struct SyncEngine {
    remote: Arc<dyn IRemoteStorage + Send + Sync>,
    local_fs: Arc<dyn ILocalFileSystem + Send + Sync>,
    state_store: Arc<dyn ISyncStateStore + Send + Sync>,
    settings: EngineSettings,
    policy: TimestampPolicy,
    tracker: SyncTracker,
    /// folder key -> names in sync after the folder's last completed pass
    baseline: DashMap<String, BTreeSet<NameKey>>,
    /// folder key -> remote folder id, learned during reconciliation
    folder_ids: DashMap<String, RemoteId>,
    /// Epoch millis at which the current tree pass began (0 when none)
    tree_pass_started: AtomicI64,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the given dependencies
    ///
    /// The baseline starts empty; call [`load_state`](Self::load_state)
    /// before the first pass.
    pub fn new(
        remote: Arc<dyn IRemoteStorage + Send + Sync>,
        local_fs: Arc<dyn ILocalFileSystem + Send + Sync>,
        state_store: Arc<dyn ISyncStateStore + Send + Sync>,
        settings: EngineSettings,
    ) -> Self {
        let folder_ids = DashMap::new();
        folder_ids.insert(String::new(), settings.remote_root_id.clone());
        Self {
            remote,
            local_fs,
            state_store,
            policy: TimestampPolicy::new(settings.conflict_threshold_ms),
            tracker: SyncTracker::new(settings.upload_suppression),
            settings,
            baseline: DashMap::new(),
            folder_ids,
            tree_pass_started: AtomicI64::new(0),
        }
    }

    /// Engine settings
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Transient per-path sets
    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    /// Baseline recorded for a local folder, if any
    pub fn baseline_for(&self, local_folder: &Path) -> Option<BTreeSet<NameKey>> {
        self.baseline
            .get(&self.folder_key(local_folder))
            .map(|names| names.clone())
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Replaces the in-memory baseline with the persisted snapshot
    ///
    /// Returns the number of folders loaded. A missing or corrupt snapshot
    /// loads as empty, which makes the next pass infer no deletions.
    pub async fn load_state(&self) -> usize {
        let snapshot = self.state_store.load().await;
        self.baseline.clear();
        for (folder, names) in snapshot.folders {
            self.baseline.insert(folder, names);
        }
        let folders = self.baseline.len();
        info!(folders, "Loaded sync baseline");
        folders
    }

    fn snapshot(&self) -> SyncStateSnapshot {
        let mut snapshot = SyncStateSnapshot::new();
        for entry in self.baseline.iter() {
            snapshot.set_folder(entry.key().clone(), entry.value().clone());
        }
        snapshot
    }

    async fn persist(&self) {
        if let Err(e) = self.state_store.save(&self.snapshot()).await {
            warn!(error = %e, "Failed to persist sync baseline");
        }
    }

    // ========================================================================
    // Path helpers
    // ========================================================================

    /// Baseline key for a local folder: root-relative, `/`-separated
    fn folder_key(&self, local_folder: &Path) -> String {
        match local_folder.strip_prefix(&self.settings.local_root) {
            Ok(rel) => rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => local_folder.to_string_lossy().into_owned(),
        }
    }

    fn is_state_file(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.settings.state_file_name)
    }

    /// Splits a path inside the root into (parent folder, file name)
    fn split_syncable<'p>(&self, path: &'p Path) -> Result<(&'p Path, &'p str), SyncError> {
        if path == self.settings.local_root || !path.starts_with(&self.settings.local_root) {
            return Err(SyncError::OutsideRoot(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SyncError::InvalidPath(path.to_path_buf()))?;
        let parent = path
            .parent()
            .ok_or_else(|| SyncError::InvalidPath(path.to_path_buf()))?;
        Ok((parent, name))
    }

    async fn list_remote(&self, folder_id: &RemoteId) -> anyhow::Result<HashMap<NameKey, RemoteEntry>> {
        let entries = self.remote.list_children(folder_id).await?;
        Ok(entries
            .into_iter()
            .filter(|e| !self.is_state_file(&e.name))
            .map(|e| (e.key(), e))
            .collect())
    }

    async fn list_local(&self, folder: &Path) -> anyhow::Result<HashMap<NameKey, LocalEntry>> {
        let entries = self.local_fs.list_dir(folder).await?;
        Ok(entries
            .into_iter()
            .filter(|e| !self.is_state_file(&e.name) && !is_temp_path(&e.path))
            .map(|e| (e.key(), e))
            .collect())
    }

    /// Drops baseline entries and cached ids for `folder` and everything
    /// below it, so a folder recreated under the same name starts unsynced
    ///
    /// Returns whether any baseline entry was removed.
    fn forget_folder(&self, folder: &str) -> bool {
        let folder = folder.to_lowercase();
        let nested = format!("{folder}/");
        let covers = |k: &String| {
            let k = k.to_lowercase();
            k == folder || k.starts_with(&nested)
        };
        self.folder_ids.retain(|k, _| !covers(k));
        let before = self.baseline.len();
        self.baseline.retain(|k, _| !covers(k));
        self.baseline.len() != before
    }

    /// Finds the remote folder mirroring `local_folder`
    ///
    /// Uses ids learned during reconciliation, falling back to a
    /// `find_by_name` walk from the root. Returns `None` if any segment does
    /// not exist remotely yet.
    async fn resolve_remote_folder(&self, local_folder: &Path) -> Option<RemoteId> {
        if !local_folder.starts_with(&self.settings.local_root) {
            return None;
        }
        let key = self.folder_key(local_folder);
        if let Some(id) = self.folder_ids.get(&key) {
            return Some(id.clone());
        }

        let mut current = self.settings.remote_root_id.clone();
        let mut prefix = String::new();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);

            if let Some(id) = self.folder_ids.get(&prefix) {
                current = id.clone();
                continue;
            }
            match self.remote.find_by_name(segment, &current).await {
                Ok(Some(id)) => {
                    self.folder_ids.insert(prefix.clone(), id.clone());
                    current = id;
                }
                Ok(None) => {
                    debug!(folder = %prefix, "Remote folder not found");
                    return None;
                }
                Err(e) => {
                    warn!(folder = %prefix, error = %e, "Failed to resolve remote folder");
                    return None;
                }
            }
        }
        Some(current)
    }

    async fn download_to(&self, entry: &RemoteEntry, destination: &Path) -> anyhow::Result<bool> {
        if !self.remote.download(&entry.id, destination).await? {
            return Ok(false);
        }
        // Carry the remote timestamp so later checks see the copy as in sync.
        if let Err(e) = self
            .local_fs
            .set_modified(destination, entry.modified_time)
            .await
        {
            warn!(path = %destination.display(), error = %e, "Failed to set modification time");
        }
        Ok(true)
    }

    // ========================================================================
    // Folder reconciliation
    // ========================================================================

    /// Reconciles one remote folder with one local folder, then recurses
    ///
    /// Never fails: step failures are logged and reported.
    #[tracing::instrument(skip_all, fields(remote = %remote_folder_id, local = %local_folder.display()))]
    pub async fn reconcile(&self, remote_folder_id: &RemoteId, local_folder: &Path) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport::default();
        self.reconcile_folder(remote_folder_id, local_folder, &mut report)
            .await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            uploads = report.uploads,
            downloads = report.downloads,
            remote_deletions = report.remote_deletions,
            local_deletions = report.local_deletions,
            folders_created = report.folders_created,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Reconciliation complete"
        );
        report
    }

    fn reconcile_folder<'a>(
        &'a self,
        remote_id: &'a RemoteId,
        local_folder: &'a Path,
        report: &'a mut SyncReport,
    ) -> PassFuture<'a> {
        Box::pin(async move {
            let key = self.folder_key(local_folder);

            // Step 1: listings
            let remote = match self.list_remote(remote_id).await {
                Ok(r) => r,
                Err(e) => {
                    report.record_error(format!("list remote folder '{key}': {e:#}"));
                    return;
                }
            };
            self.folder_ids.insert(key.clone(), remote_id.clone());
            let local = match self.list_local(local_folder).await {
                Ok(l) => l,
                Err(e) => {
                    report.record_error(format!("list local folder '{key}': {e:#}"));
                    return;
                }
            };

            // Step 2: baseline
            let baseline = self
                .baseline
                .get(&key)
                .map(|names| names.clone())
                .unwrap_or_default();
            debug!(
                folder = %key,
                remote = remote.len(),
                local = local.len(),
                baseline = baseline.len(),
                "Reconciling folder"
            );

            // Names that must not enter the new baseline
            let mut excluded: HashSet<NameKey> = HashSet::new();
            // Subfolders already recursed into during steps 4 and 7
            let mut visited: HashSet<NameKey> = HashSet::new();

            // Step 3: deletion pass
            for name in &baseline {
                match (remote.get(name), local.get(name)) {
                    (Some(r), None) => match self.remote.delete(&r.id).await {
                        Ok(_) => {
                            debug!(name = %r.name, "Propagated local deletion to remote");
                            if r.is_folder {
                                self.forget_folder(&child_key(&key, &r.name));
                            }
                            report.remote_deletions += 1;
                            excluded.insert(name.clone());
                        }
                        Err(e) => {
                            report.record_error(format!("delete remote '{}': {e:#}", r.name));
                        }
                    },
                    (None, Some(l)) => {
                        if self.tracker.is_recently_uploaded(&l.path) {
                            debug!(name = %l.name, "Recent upload not listed yet, keeping local copy");
                            continue;
                        }
                        match self.local_fs.remove(&l.path).await {
                            Ok(_) => {
                                debug!(name = %l.name, "Propagated remote deletion to local");
                                if l.is_directory {
                                    self.forget_folder(&child_key(&key, &l.name));
                                }
                                report.local_deletions += 1;
                                excluded.insert(name.clone());
                            }
                            Err(e) => {
                                report.record_error(format!(
                                    "delete local '{}': {e:#}",
                                    l.path.display()
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }

            // Step 4: upload pass
            for (name, l) in &local {
                if remote.contains_key(name) || baseline.contains(name) {
                    continue;
                }
                if l.is_directory {
                    match self.remote.create_folder(&l.name, remote_id).await {
                        Ok(new_id) => {
                            report.folders_created += 1;
                            visited.insert(name.clone());
                            self.forget_folder(&child_key(&key, &l.name));
                            self.reconcile_folder(&new_id, &l.path, report).await;
                        }
                        Err(e) => {
                            report.record_error(format!("create remote folder '{}': {e:#}", l.name));
                            excluded.insert(name.clone());
                        }
                    }
                } else if self.tracker.is_recently_uploaded(&l.path) {
                    debug!(name = %l.name, "Upload already in flight");
                } else {
                    match self.remote.upload(&l.path, remote_id, None).await {
                        Ok(_) => {
                            self.tracker.mark_uploaded(&l.path);
                            report.uploads += 1;
                        }
                        Err(e) => {
                            report.record_error(format!("upload '{}': {e:#}", l.path.display()));
                            excluded.insert(name.clone());
                        }
                    }
                }
            }

            // Step 5: re-list remote
            let mut remote = match self.list_remote(remote_id).await {
                Ok(r) => r,
                Err(e) => {
                    report.record_error(format!("re-list remote folder '{key}': {e:#}"));
                    return;
                }
            };

            // Step 6: pending-deletion flush
            let mut flushed = Vec::new();
            for (name, r) in &remote {
                let path = local_folder.join(&r.name);
                if !self.tracker.is_pending_deletion(&path) {
                    continue;
                }
                // A local copy means the path came back; the queued deletion is stale.
                if local.contains_key(name) {
                    self.tracker.clear_pending_deletion(&path);
                    debug!(name = %r.name, "Path recreated locally, dropped queued deletion");
                    continue;
                }
                match self.remote.delete(&r.id).await {
                    Ok(_) => {
                        self.tracker.clear_pending_deletion(&path);
                        if r.is_folder {
                            self.forget_folder(&child_key(&key, &r.name));
                        }
                        report.remote_deletions += 1;
                        flushed.push(name.clone());
                    }
                    Err(e) => {
                        report.record_error(format!("flush pending deletion '{}': {e:#}", r.name));
                    }
                }
            }
            for name in flushed {
                remote.remove(&name);
            }
            let stale = self
                .tracker
                .retain_pending_in(local_folder, |name| remote.contains_key(&NameKey::new(name)));
            if stale > 0 {
                debug!(folder = %key, stale, "Dropped queued deletions already absent remotely");
            }

            // Step 7: download pass
            for (name, r) in &remote {
                if local.contains_key(name) || baseline.contains(name) {
                    continue;
                }
                let path = local_folder.join(&r.name);
                if self.tracker.is_deleted_locally(&path) {
                    debug!(name = %r.name, "Local deletion in flight, not downloading");
                    continue;
                }
                if r.is_folder {
                    match self.local_fs.create_dir(&path).await {
                        Ok(()) => {
                            report.folders_created += 1;
                            visited.insert(name.clone());
                            self.forget_folder(&child_key(&key, &r.name));
                            self.reconcile_folder(&r.id, &path, report).await;
                        }
                        Err(e) => {
                            report.record_error(format!(
                                "create local folder '{}': {e:#}",
                                path.display()
                            ));
                            excluded.insert(name.clone());
                        }
                    }
                } else {
                    match self.download_to(r, &path).await {
                        Ok(true) => report.downloads += 1,
                        Ok(false) => {
                            report.record_error(format!("download '{}': not available", r.name));
                            excluded.insert(name.clone());
                        }
                        Err(e) => {
                            report.record_error(format!("download '{}': {e:#}", r.name));
                            excluded.insert(name.clone());
                        }
                    }
                }
            }

            // Step 8: new baseline
            let names: BTreeSet<NameKey> = local
                .keys()
                .chain(remote.keys())
                .filter(|name| !excluded.contains(*name))
                .cloned()
                .collect();
            for dropped in baseline.difference(&names) {
                self.forget_folder(&child_key(&key, dropped.as_str()));
            }
            self.baseline.insert(key.clone(), names);
            self.persist().await;

            // Depth-first into subfolders present on both sides
            for (name, l) in &local {
                if !l.is_directory || visited.contains(name) || excluded.contains(name) {
                    continue;
                }
                match remote.get(name) {
                    Some(r) if r.is_folder => {
                        self.reconcile_folder(&r.id, &l.path, report).await;
                    }
                    Some(_) => {
                        warn!(name = %l.name, "Local folder matches a remote file, skipping");
                    }
                    None => {}
                }
            }
        })
    }

    // ========================================================================
    // Tree passes
    // ========================================================================

    /// Reconciles the configured root and marks the start of a tree pass
    pub async fn reconcile_root(&self) -> SyncReport {
        self.tree_pass_started.store(now_millis(), Ordering::SeqCst);
        let root_id = self.settings.remote_root_id.clone();
        let root = self.settings.local_root.clone();
        self.reconcile(&root_id, &root).await
    }

    /// Full tree pass: root reconciliation followed by untracked cleanup
    pub async fn reconcile_tree(&self) -> SyncReport {
        let start = Instant::now();
        let mut report = self.reconcile_root().await;
        report.merge(self.cleanup_untracked_local().await);
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Deletes root-level local files whose names are absent remotely
    ///
    /// Guards against files that predate the baseline or slipped past the
    /// folder-level deletion passes. Skips the state file, names inside the
    /// upload suppression window, and files modified after the current tree
    /// pass began. Does nothing if the remote listing fails. Clears the
    /// in-flight local deletion set afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_untracked_local(&self) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport::default();

        let remote = match self.list_remote(&self.settings.remote_root_id).await {
            Ok(r) => r,
            Err(e) => {
                report.record_error(format!("list remote root for cleanup: {e:#}"));
                return report;
            }
        };
        let local = match self.list_local(&self.settings.local_root).await {
            Ok(l) => l,
            Err(e) => {
                report.record_error(format!("list local root for cleanup: {e:#}"));
                return report;
            }
        };

        let pass_started = match self.tree_pass_started.load(Ordering::SeqCst) {
            0 => now_millis(),
            t => t,
        };

        for (name, l) in &local {
            if l.is_directory || remote.contains_key(name) {
                continue;
            }
            if self.tracker.is_recently_uploaded(&l.path) || l.last_modified > pass_started {
                debug!(name = %l.name, "Untracked file is fresh, keeping");
                continue;
            }
            match self.local_fs.remove(&l.path).await {
                Ok(true) => {
                    info!(path = %l.path.display(), "Removed local file absent remotely");
                    report.local_deletions += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    report.record_error(format!("cleanup '{}': {e:#}", l.path.display()));
                }
            }
        }

        self.tracker.clear_all_deleted_locally();
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Downloads remote root files that are missing locally or newer
    ///
    /// Folders are never touched here. Paths with an in-flight local
    /// deletion or a fresh upload are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_from_remote_listing(&self) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport::default();

        let remote = match self.list_remote(&self.settings.remote_root_id).await {
            Ok(r) => r,
            Err(e) => {
                report.record_error(format!("list remote root: {e:#}"));
                return report;
            }
        };

        for r in remote.values().filter(|r| !r.is_folder) {
            let path = self.settings.local_root.join(&r.name);
            if self.tracker.is_deleted_locally(&path) || self.tracker.is_recently_uploaded(&path) {
                continue;
            }
            let wanted = match self.local_fs.entry(&path).await {
                Ok(None) => true,
                Ok(Some(l)) => !l.is_directory && r.modified_time > l.last_modified,
                Err(e) => {
                    report.record_error(format!("stat '{}': {e:#}", path.display()));
                    continue;
                }
            };
            if !wanted {
                continue;
            }
            match self.download_to(r, &path).await {
                Ok(true) => report.downloads += 1,
                Ok(false) => {}
                Err(e) => report.record_error(format!("download '{}': {e:#}", r.name)),
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        if report.downloads > 0 {
            info!(downloads = report.downloads, "Full listing check fetched files");
        }
        report
    }

    // ========================================================================
    // Watcher-triggered paths
    // ========================================================================

    /// Records that `path` was (re)created locally
    ///
    /// Cancels any in-flight deletion bookkeeping for it.
    pub fn note_local_creation(&self, path: &Path) {
        let was_deleted = self.tracker.clear_deleted_locally(path);
        let was_pending = self.tracker.clear_pending_deletion(path);
        if was_deleted || was_pending {
            debug!(path = %path.display(), "Path recreated, dropped deletion bookkeeping");
        }
    }

    /// Per-file check for one local path
    ///
    /// New files are uploaded and enter the suppression window. For files
    /// present on both sides the [`TimestampPolicy`] decides: a newer local
    /// copy replaces the remote content, anything else is left alone.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub async fn sync_file(&self, path: &Path) -> FileSyncOutcome {
        if self.tracker.is_recently_uploaded(path) {
            debug!("Inside upload suppression window");
            return FileSyncOutcome::Suppressed;
        }

        let (parent, name) = match self.split_syncable(path) {
            Ok(parts) => parts,
            Err(e) => {
                debug!(error = %e, "Not syncable");
                return FileSyncOutcome::Skipped;
            }
        };
        if self.is_state_file(name) || is_temp_path(path) {
            return FileSyncOutcome::Skipped;
        }

        let local = match self.local_fs.entry(path).await {
            Ok(Some(entry)) if !entry.is_directory => entry,
            Ok(_) => return FileSyncOutcome::Skipped,
            Err(e) => {
                warn!(error = %e, "Failed to stat local file");
                return FileSyncOutcome::Failed;
            }
        };

        let Some(parent_id) = self.resolve_remote_folder(parent).await else {
            debug!("Parent folder not on remote yet, leaving to reconciliation");
            return FileSyncOutcome::Skipped;
        };

        let existing = match self.remote.find_by_name(name, &parent_id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "Failed to look up remote file");
                return FileSyncOutcome::Failed;
            }
        };

        let remote_modified = match &existing {
            Some(id) => match self.remote.get_modified_time(id).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "Failed to read remote modification time");
                    return FileSyncOutcome::Failed;
                }
            },
            None => None,
        };

        match (existing, remote_modified) {
            (Some(id), Some(remote_ms)) => match self.policy.evaluate(local.last_modified, remote_ms) {
                FileDecision::UploadLocal => match self.remote.upload(path, &parent_id, Some(&id)).await {
                    Ok(_) => {
                        self.tracker.mark_uploaded(path);
                        info!("Local copy newer, replaced remote content");
                        FileSyncOutcome::Replaced
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to replace remote content");
                        FileSyncOutcome::Failed
                    }
                },
                FileDecision::RemoteNewer => {
                    info!(
                        local_ms = local.last_modified,
                        remote_ms, "Remote copy newer, leaving both untouched"
                    );
                    FileSyncOutcome::RemoteNewer
                }
                FileDecision::InSync => FileSyncOutcome::InSync,
            },
            // Absent remotely (or vanished between lookups): new upload
            _ => match self.remote.upload(path, &parent_id, None).await {
                Ok(_) => {
                    self.tracker.mark_uploaded(path);
                    info!("Uploaded new file");
                    FileSyncOutcome::Uploaded
                }
                Err(e) => {
                    warn!(error = %e, "Failed to upload new file");
                    FileSyncOutcome::Failed
                }
            },
        }
    }

    /// Propagates a local deletion of `path` to the remote side
    ///
    /// Marks the path as deleted locally, deletes the remote counterpart,
    /// and removes the local entry if it still exists. When the counterpart
    /// cannot be resolved or deleted the path is queued for the next
    /// reconciliation pass. Safe to call repeatedly.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub async fn handle_local_deletion(&self, path: &Path) -> DeletionOutcome {
        let (parent, name) = match self.split_syncable(path) {
            Ok(parts) => parts,
            Err(e) => {
                debug!(error = %e, "Not syncable");
                return DeletionOutcome::Skipped;
            }
        };
        if self.is_state_file(name) || is_temp_path(path) {
            return DeletionOutcome::Skipped;
        }

        self.tracker.mark_deleted_locally(path);

        let outcome = match self.resolve_remote_folder(parent).await {
            None => {
                self.tracker.queue_deletion(path);
                DeletionOutcome::Queued
            }
            Some(parent_id) => match self.remote.find_by_name(name, &parent_id).await {
                Ok(Some(id)) => match self.remote.delete(&id).await {
                    Ok(true) => DeletionOutcome::RemoteDeleted,
                    Ok(false) => DeletionOutcome::AlreadyAbsent,
                    Err(e) => {
                        warn!(error = %e, "Remote delete failed, queued for next pass");
                        self.tracker.queue_deletion(path);
                        DeletionOutcome::Queued
                    }
                },
                Ok(None) => DeletionOutcome::AlreadyAbsent,
                Err(e) => {
                    warn!(error = %e, "Remote lookup failed, queued for next pass");
                    self.tracker.queue_deletion(path);
                    DeletionOutcome::Queued
                }
            },
        };

        if let Err(e) = self.local_fs.remove(path).await {
            warn!(error = %e, "Failed to remove local entry");
        }
        if self.forget_folder(&self.folder_key(path)) {
            self.persist().await;
        }

        info!(outcome = ?outcome, "Handled local deletion");
        outcome
    }
}

// ============================================================================
// Unit tests
// ============================================================================
