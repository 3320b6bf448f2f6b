//! Domain types for foldsync
//!
//! - Newtypes for validated identifiers and case-insensitive name keys
//! - Remote and local directory entries
//! - The persisted baseline snapshot
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod newtypes;
pub mod snapshot;

pub use entry::{
    is_temp_path, now_millis, system_time_to_millis, temp_path_for, validate_entry_name, LocalEntry,
    RemoteEntry, TEMP_FILE_SUFFIX,
};
pub use errors::DomainError;
pub use newtypes::{NameKey, RemoteId};
pub use snapshot::{SyncStateSnapshot, SNAPSHOT_VERSION};
