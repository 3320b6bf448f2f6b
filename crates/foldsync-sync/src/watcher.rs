//! File watching
//!
//! Provides a [`FileWatcher`] that wraps the `notify` crate to monitor the
//! local sync root, converting raw OS events into [`ChangeEvent`] values sent
//! through a bounded channel. Debouncing happens downstream in the
//! [`SyncScheduler`](crate::scheduler::SyncScheduler).
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue / FSEvents
//!       │
//!       ▼
//!  FileWatcher  ──→  mpsc::channel  ──→  SyncScheduler  ──→  SyncEngine
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use foldsync_core::domain::is_temp_path;

// ============================================================================
// ChangeEvent enum
// ============================================================================

/// A local filesystem change, decoupled from `notify`'s raw event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A new file or directory appeared at the given path
    Created(PathBuf),
    /// An existing entry's content or metadata changed
    Modified(PathBuf),
    /// The entry at the given path is gone
    Deleted(PathBuf),
}

impl ChangeEvent {
    /// Returns the path associated with this event
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) | ChangeEvent::Modified(p) | ChangeEvent::Deleted(p) => p,
        }
    }
}

// ============================================================================
// FileWatcher struct
// ============================================================================

/// Watches the local tree using the OS-native mechanism
///
/// ## Usage
///
/// ```ignore
/// let (mut watcher, rx) = FileWatcher::new(1024, ".sync_state.json")?;
/// watcher.watch(Path::new("/home/user/Foldsync"))?;
/// // rx.recv().await to get events; dropping the watcher closes the channel
/// ```
pub struct FileWatcher {
    /// The underlying notify watcher instance
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Creates a new `FileWatcher` and the receiver for its events
    ///
    /// # Arguments
    /// * `capacity` - Bound of the event channel
    /// * `state_file_name` - Baseline file name whose events are dropped
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new(
        capacity: usize,
        state_file_name: impl Into<String>,
    ) -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (event_tx, event_rx) = mpsc::channel::<ChangeEvent>(capacity.max(1));
        let ignored_name = state_file_name.into();

        info!(capacity, "Initializing file watcher");

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for change in map_notify_event(&event) {
                        if is_ignored(change.path(), &ignored_name) {
                            continue;
                        }
                        if let Err(e) = event_tx.blocking_send(change) {
                            warn!(error = %e, "Failed to send change event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, event_rx))
    }

    /// Starts watching a directory recursively
    ///
    /// # Errors
    /// Returns an error if the path cannot be watched (e.g., does not exist,
    /// insufficient permissions, or inotify watch limit reached)
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Starting recursive watch");
        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))
    }
}

/// Whether events for `path` never reach the scheduler
fn is_ignored(path: &Path, state_file_name: &str) -> bool {
    if is_temp_path(path) {
        return true;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.eq_ignore_ascii_case(state_file_name))
}

// ============================================================================
// Event mapping - notify::Event → ChangeEvent
// ============================================================================

/// Converts a `notify::Event` into zero or more [`ChangeEvent`]s
///
/// - `Create(*)` -> `Created`
/// - `Modify(Name(Both))` with two paths -> `Deleted(old)` + `Created(new)`
/// - `Modify(Name(From))` -> `Deleted`, `Modify(Name(To))` -> `Created`
/// - `Modify(Name(_))` otherwise -> `Created` or `Deleted` by whether the
///   path still exists
/// - Other `Modify(*)` -> `Modified`
/// - `Remove(*)` -> `Deleted`
/// - Access and unknown events are ignored
pub fn map_notify_event(event: &notify::Event) -> Vec<ChangeEvent> {
    let paths = &event.paths;
    let Some(first) = paths.first() else {
        return Vec::new();
    };

    match &event.kind {
        EventKind::Create(_) => vec![ChangeEvent::Created(first.clone())],

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths.get(1) {
            Some(new) => {
                debug!(old = %first.display(), new = %new.display(), "Mapped rename");
                vec![
                    ChangeEvent::Deleted(first.clone()),
                    ChangeEvent::Created(new.clone()),
                ]
            }
            None => vec![ChangeEvent::Modified(first.clone())],
        },

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            vec![ChangeEvent::Deleted(first.clone())]
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            vec![ChangeEvent::Created(first.clone())]
        }

        EventKind::Modify(ModifyKind::Name(_)) => {
            if first.exists() {
                vec![ChangeEvent::Created(first.clone())]
            } else {
                vec![ChangeEvent::Deleted(first.clone())]
            }
        }

        EventKind::Modify(_) => vec![ChangeEvent::Modified(first.clone())],

        EventKind::Remove(_) => vec![ChangeEvent::Deleted(first.clone())],

        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            Vec::new()
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
