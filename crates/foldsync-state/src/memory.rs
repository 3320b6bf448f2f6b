//! In-memory snapshot store

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use foldsync_core::domain::SyncStateSnapshot;
use foldsync_core::ports::ISyncStateStore;
use tokio::sync::RwLock;

/// Snapshot store that keeps the baseline in process memory
///
/// Counts saves and can be told to fail them, which lets tests observe
/// the engine's persistence behavior without touching disk.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: RwLock<SyncStateSnapshot>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStateStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `snapshot`
    pub fn with_snapshot(snapshot: SyncStateSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    /// Returns a copy of the last saved snapshot
    pub async fn snapshot(&self) -> SyncStateSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes subsequent saves fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ISyncStateStore for MemoryStateStore {
    async fn load(&self) -> SyncStateSnapshot {
        self.snapshot.read().await.clone()
    }

    async fn save(&self, snapshot: &SyncStateSnapshot) -> anyhow::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("state store unavailable");
        }
        *self.snapshot.write().await = snapshot.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
