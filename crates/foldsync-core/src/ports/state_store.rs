//! Sync state store port (driven/secondary port)
//!
//! Persists the baseline snapshot. Loading never fails from the caller's
//! point of view: a missing or unreadable snapshot is an empty one, which
//! makes the next pass treat every entry as new rather than deleted.

use crate::domain::SyncStateSnapshot;

/// Port trait for baseline persistence
#[async_trait::async_trait]
pub trait ISyncStateStore: Send + Sync {
    /// Loads the last saved snapshot, or an empty one
    async fn load(&self) -> SyncStateSnapshot;

    /// Overwrites the persisted snapshot wholesale
    ///
    /// Best-effort: callers log the error and carry on.
    async fn save(&self, snapshot: &SyncStateSnapshot) -> anyhow::Result<()>;
}
