//! Sync scheduler - turns watcher events into debounced engine calls
//!
//! The [`SyncScheduler`] sits between the [`FileWatcher`](super::watcher::FileWatcher)
//! and the [`SyncEngine`]. Every created or modified path gets its own
//! debounce timer; further events for the same path restart it, so a burst
//! of writes results in a single [`SyncEngine::sync_file`] call once the
//! path has been quiet for the debounce delay. Deletions are not debounced.
//!
//! ## Flow
//!
//! ```text
//! FileWatcher ──→ mpsc::Receiver ──→ SyncScheduler ──→ timer per path ──→ SyncEngine::sync_file
//!                                        │
//!                                        └── Deleted ──→ SyncEngine::handle_local_deletion
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::SyncEngine;
use crate::tracker::path_key;
use crate::watcher::ChangeEvent;

/// A debounce timer that has not fired yet
struct PendingSync {
    generation: u64,
    cancel: CancellationToken,
}

// ============================================================================
// SyncScheduler struct
// ============================================================================

/// Per-path debounce dispatcher
///
/// Owns the receiving end of the watcher channel. Runs until the channel
/// closes or the shutdown token fires; either way all pending timers are
/// cancelled without syncing.
pub struct SyncScheduler {
    /// Receiver for change events from the FileWatcher
    change_rx: mpsc::Receiver<ChangeEvent>,
    /// Engine that performs the actual work
    engine: Arc<SyncEngine>,
    /// How long a path must be quiet before it is synced
    debounce: Duration,
    /// Cancelled on daemon shutdown
    shutdown: CancellationToken,
    /// path key -> live timer
    pending: HashMap<String, PendingSync>,
    next_generation: u64,
    /// Timers report back here once they fire
    expired_tx: mpsc::UnboundedSender<(String, u64)>,
    expired_rx: mpsc::UnboundedReceiver<(String, u64)>,
}

impl SyncScheduler {
    /// Creates a new `SyncScheduler`
    ///
    /// # Arguments
    /// * `change_rx` - Channel receiver for filesystem change events
    /// * `engine` - Shared sync engine
    /// * `debounce` - Quiet period required before a path is synced
    /// * `shutdown` - Token that stops the scheduler
    pub fn new(
        change_rx: mpsc::Receiver<ChangeEvent>,
        engine: Arc<SyncEngine>,
        debounce: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        info!(
            debounce_ms = debounce.as_millis() as u64,
            "Creating sync scheduler"
        );
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        Self {
            change_rx,
            engine,
            debounce,
            shutdown,
            pending: HashMap::new(),
            next_generation: 0,
            expired_tx,
            expired_rx,
        }
    }

    /// Number of paths with a live debounce timer
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Routes one change event
    pub fn handle_event(&mut self, event: ChangeEvent) {
        debug!(event = ?event, "Scheduler received change event");
        match event {
            ChangeEvent::Created(path) => {
                self.engine.note_local_creation(&path);
                self.schedule(path);
            }
            ChangeEvent::Modified(path) => self.schedule(path),
            ChangeEvent::Deleted(path) => {
                if let Some(previous) = self.pending.remove(&path_key(&path)) {
                    previous.cancel.cancel();
                }
                let engine = self.engine.clone();
                tokio::spawn(async move {
                    engine.handle_local_deletion(&path).await;
                });
            }
        }
    }

    /// Starts or restarts the debounce timer for `path`
    fn schedule(&mut self, path: PathBuf) {
        let key = path_key(&path);
        if let Some(previous) = self.pending.remove(&key) {
            previous.cancel.cancel();
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = self.shutdown.child_token();
        self.pending.insert(
            key.clone(),
            PendingSync {
                generation,
                cancel: cancel.clone(),
            },
        );

        let engine = self.engine.clone();
        let expired_tx = self.expired_tx.clone();
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // The receiver only disappears when the scheduler stopped.
            let _ = expired_tx.send((key, generation));
            let outcome = engine.sync_file(&path).await;
            debug!(path = %path.display(), outcome = ?outcome, "Debounced sync finished");
        });
    }

    fn forget_expired(&mut self, key: String, generation: u64) {
        // A newer event may have replaced the timer that just fired.
        if self
            .pending
            .get(&key)
            .is_some_and(|p| p.generation == generation)
        {
            self.pending.remove(&key);
        }
    }

    fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.cancel.cancel();
        }
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Main event loop
    ///
    /// Terminates when the change channel is closed (watcher dropped) or
    /// the shutdown token is cancelled.
    pub async fn run(mut self) {
        info!("Sync scheduler starting");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }

                Some((key, generation)) = self.expired_rx.recv() => {
                    self.forget_expired(key, generation);
                }

                event = self.change_rx.recv() => {
                    match event {
                        Some(change) => self.handle_event(change),
                        None => {
                            info!("Change channel closed, scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        }

        let dropped = self.pending.len();
        self.cancel_all();
        info!(dropped, "Sync scheduler stopped");
    }
}

// ============================================================================
// Unit tests
// ============================================================================
