//! Remote change poller
//!
//! Two independent loops drive the engine on fixed cadences:
//!
//! - **Full listing** (slow): [`SyncEngine::refresh_from_remote_listing`]
//! - **Reconciliation** (fast): [`SyncEngine::reconcile_root`] followed by
//!   [`SyncEngine::cleanup_untracked_local`], separated by a short settle
//!   delay so remote listings can catch up with the pass's own writes
//!
//! Each iteration runs as its own task. A panic inside one iteration is
//! logged and the loop carries on with the next tick. Both loops fire
//! immediately on start and stop at the next cancellation point once the
//! shutdown token is cancelled; in-flight remote calls are left to finish.

use std::sync::Arc;
use std::time::Duration;

use foldsync_core::config::Config;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::SyncEngine;

/// Loop cadences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Period of the full-listing loop
    pub full_listing_interval: Duration,
    /// Period of the reconciliation loop
    pub reconcile_interval: Duration,
    /// Pause before a reconciliation pass and before its cleanup step
    pub settle_delay: Duration,
}

impl Default for PollerSettings {
    /// Same cadences as the default `poller` configuration section
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PollerSettings {
    /// Reads the `poller` section of the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            full_listing_interval: Duration::from_secs(config.poller.full_listing_interval_secs),
            reconcile_interval: Duration::from_secs(config.poller.reconcile_interval_secs),
            settle_delay: Duration::from_millis(config.poller.settle_delay_ms),
        }
    }
}

/// Join handles of the two running loops
pub struct PollerHandles {
    /// Full-listing loop
    pub full_listing: JoinHandle<()>,
    /// Reconciliation loop
    pub reconcile: JoinHandle<()>,
}

impl PollerHandles {
    /// Waits for both loops to stop
    pub async fn join(self) {
        if let Err(e) = self.full_listing.await {
            error!(error = %e, "Full-listing loop terminated abnormally");
        }
        if let Err(e) = self.reconcile.await {
            error!(error = %e, "Reconciliation loop terminated abnormally");
        }
    }
}

/// Starts and owns the two polling loops
pub struct RemoteChangePoller {
    engine: Arc<SyncEngine>,
    settings: PollerSettings,
    shutdown: CancellationToken,
}

impl RemoteChangePoller {
    /// Creates a poller; nothing runs until [`spawn`](Self::spawn)
    pub fn new(engine: Arc<SyncEngine>, settings: PollerSettings, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            settings,
            shutdown,
        }
    }

    /// Spawns both loops on the current runtime
    pub fn spawn(self) -> PollerHandles {
        info!(
            full_listing_secs = self.settings.full_listing_interval.as_secs(),
            reconcile_secs = self.settings.reconcile_interval.as_secs(),
            "Starting remote change poller"
        );

        let full_listing = {
            let engine = self.engine.clone();
            tokio::spawn(run_loop(
                "full_listing",
                self.settings.full_listing_interval,
                self.shutdown.clone(),
                move || {
                    let engine = engine.clone();
                    async move {
                        engine.refresh_from_remote_listing().await;
                    }
                },
            ))
        };

        let reconcile = {
            let engine = self.engine.clone();
            let settle = self.settings.settle_delay;
            let token = self.shutdown.clone();
            tokio::spawn(run_loop(
                "reconcile",
                self.settings.reconcile_interval,
                self.shutdown.clone(),
                move || {
                    let engine = engine.clone();
                    let token = token.clone();
                    async move {
                        if !settle_or_cancel(settle, &token).await {
                            return;
                        }
                        engine.reconcile_root().await;
                        if !settle_or_cancel(settle, &token).await {
                            return;
                        }
                        engine.cleanup_untracked_local().await;
                    }
                },
            ))
        };

        PollerHandles {
            full_listing,
            reconcile,
        }
    }
}

/// Sleeps for `delay`; returns false if shutdown came first
async fn settle_or_cancel(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Runs `iteration` on every tick until `shutdown` is cancelled
async fn run_loop<F, Fut>(name: &'static str, period: Duration, shutdown: CancellationToken, iteration: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        debug!(loop_name = name, "Poll iteration starting");
        if let Err(e) = tokio::spawn(iteration()).await {
            error!(loop_name = name, error = %e, "Poll iteration panicked");
        }
    }

    info!(loop_name = name, "Poll loop stopped");
}
