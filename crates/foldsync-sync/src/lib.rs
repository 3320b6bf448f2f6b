//! Foldsync Sync - Bidirectional folder synchronization engine
//!
//! Provides:
//! - Baseline-driven folder reconciliation (new vs. deleted vs. unchanged)
//! - Per-file timestamp checks for watcher-triggered syncs
//! - Debounced local change dispatch
//! - Two-cadence remote polling
//!
//! ## Modules
//!
//! - [`engine`] - Reconciliation, per-file checks and deletion handling
//! - [`tracker`] - Transient recently-uploaded / pending / deleted sets
//! - [`policy`] - Timestamp comparison with a skew threshold
//! - [`filesystem`] - Local filesystem adapter (atomic writes, mtimes)
//! - [`watcher`] - `notify`-backed watcher producing [`watcher::ChangeEvent`]s
//! - [`scheduler`] - Per-path debounce dispatcher feeding the engine
//! - [`poller`] - Full-listing and reconciliation loops

pub mod engine;
pub mod filesystem;
pub mod poller;
pub mod policy;
pub mod scheduler;
pub mod tracker;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while setting up or addressing a sync tree
#[derive(Debug, Error)]
pub enum SyncError {
    /// The path is not inside the synchronized local root
    #[error("Path outside sync root: {0}")]
    OutsideRoot(PathBuf),

    /// The path has no usable file name component
    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    /// A domain-level error propagated from foldsync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] foldsync_core::domain::DomainError),
}
