//! Directory entries as seen on each side of a synchronized folder
//!
//! Both entry types carry modification times as epoch milliseconds so the
//! timestamp policy can compare them directly.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{NameKey, RemoteId};

/// A child of a remote folder, as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Identity of the entry in the remote store
    pub id: RemoteId,
    /// Display name (unique within a parent only by convention)
    pub name: String,
    /// Whether the entry is a folder
    pub is_folder: bool,
    /// Last modification time in epoch milliseconds
    pub modified_time: i64,
}

impl RemoteEntry {
    /// Case-insensitive comparison key for this entry
    pub fn key(&self) -> NameKey {
        NameKey::new(&self.name)
    }
}

/// A child of a local directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// Absolute path of the entry
    pub path: PathBuf,
    /// File name component
    pub name: String,
    /// Last modification time in epoch milliseconds
    pub last_modified: i64,
    /// Whether the entry is a directory
    pub is_directory: bool,
}

impl LocalEntry {
    /// Case-insensitive comparison key for this entry
    pub fn key(&self) -> NameKey {
        NameKey::new(&self.name)
    }
}

/// Rejects names that cannot be a single path component
///
/// # Errors
/// Returns [`DomainError::InvalidName`] for empty names, `.`/`..`, and
/// names containing a path separator or NUL.
pub fn validate_entry_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Suffix of the sibling file used for atomic writes
pub const TEMP_FILE_SUFFIX: &str = ".foldsync-tmp";

/// Sibling temporary path for an atomic write to `target`
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut p = target.as_os_str().to_owned();
    p.push(TEMP_FILE_SUFFIX);
    PathBuf::from(p)
}

/// Returns true for in-flight atomic-write temporaries
pub fn is_temp_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMP_FILE_SUFFIX))
}

/// Converts a filesystem timestamp to epoch milliseconds
///
/// Times before the epoch clamp to 0.
pub fn system_time_to_millis(time: SystemTime) -> i64 {
    let dt: DateTime<Utc> = time.into();
    dt.timestamp_millis().max(0)
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
