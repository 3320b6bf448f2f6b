//! Persisted baseline snapshot
//!
//! The snapshot maps a folder key (the folder path relative to the sync
//! root, `/`-separated, `""` for the root) to the set of name keys that
//! were synchronized when that folder's last pass completed. It is written
//! wholesale after every folder pass and read wholesale at startup.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::NameKey;

/// Current on-disk format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full `folder -> names` baseline mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateSnapshot {
    /// Format version, checked on load
    pub version: u32,
    /// Baseline names per folder key
    pub folders: BTreeMap<String, BTreeSet<NameKey>>,
}

impl SyncStateSnapshot {
    /// Creates an empty snapshot at the current format version
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            folders: BTreeMap::new(),
        }
    }

    /// Returns the baseline for a folder, if one was recorded
    pub fn folder(&self, key: &str) -> Option<&BTreeSet<NameKey>> {
        self.folders.get(key)
    }

    /// Replaces the baseline for a folder
    pub fn set_folder(&mut self, key: impl Into<String>, names: BTreeSet<NameKey>) {
        self.folders.insert(key.into(), names);
    }

    /// Number of folders with a recorded baseline
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    /// Returns true when no folder has a baseline
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Decodes a snapshot from its JSON encoding
    ///
    /// # Errors
    /// Returns an error for malformed JSON or an unknown version. Callers
    /// loading persisted state treat any error as an empty baseline.
    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DomainError::UnsupportedSnapshotVersion(snapshot.version).into());
        }
        Ok(snapshot)
    }

    /// Encodes the snapshot as pretty-printed JSON
    ///
    /// # Errors
    /// Returns an error if serialization fails
    pub fn to_json(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
