//! Foldsync State - Baseline snapshot persistence
//!
//! Stores the `folder -> synchronized names` baseline that lets the sync
//! engine tell a never-synced entry from a deleted one.
//!
//! ## Architecture
//!
//! This crate implements the `ISyncStateStore` port from `foldsync-core`.
//! It is a driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`JsonStateStore`] - Durable JSON snapshot file with atomic overwrite
//! - [`MemoryStateStore`] - In-process store for tests and ephemeral runs
//! - [`StateStoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use foldsync_core::ports::ISyncStateStore;
//! use foldsync_state::JsonStateStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = JsonStateStore::new("/home/user/Foldsync/.sync_state.json");
//! let mut snapshot = store.load().await;
//! snapshot.set_folder("", Default::default());
//! store.save(&snapshot).await?;
//! # Ok(())
//! # }
//! ```

pub mod json;
pub mod memory;

pub use json::JsonStateStore;
pub use memory::MemoryStateStore;

/// Errors that can occur while persisting the baseline
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    /// Reading or writing the snapshot file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Encoding the snapshot failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
