//! Port definitions (hexagonal architecture interfaces)
//!
//! The sync engine depends only on these traits; adapter crates implement
//! them.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStorage`] - Remote folder/file CRUD keyed by opaque ids
//! - [`ILocalFileSystem`] - Local directory listing and file I/O
//! - [`ISyncStateStore`] - Durable baseline snapshot persistence

pub mod local_filesystem;
pub mod remote_storage;
pub mod state_store;

pub use local_filesystem::ILocalFileSystem;
pub use remote_storage::IRemoteStorage;
pub use state_store::ISyncStateStore;
