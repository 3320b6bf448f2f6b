//! Foldsync Daemon - Background synchronization service
//!
//! This binary keeps a local folder and a remote folder tree in sync:
//! - Local change watching with per-path debounce
//! - Periodic full-listing and reconciliation polls
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the local filesystem adapter, the directory-backed
//! remote and the JSON state store into one shared `SyncEngine`, then runs
//! the watcher dispatcher and both polling loops until a `CancellationToken`
//! is triggered by a shutdown signal. With `--once` it performs a single
//! full tree pass and exits.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use foldsync_core::config::Config;
use foldsync_remote::DirectoryRemote;
use foldsync_state::JsonStateStore;
use foldsync_sync::{
    engine::{EngineSettings, SyncEngine, SyncReport},
    filesystem::LocalFileSystemAdapter,
    poller::{PollerSettings, RemoteChangePoller},
    scheduler::SyncScheduler,
    watcher::FileWatcher,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "foldsyncd", version, about = "Bidirectional folder synchronization daemon")]
struct Args {
    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single reconciliation pass and exit
    #[arg(long)]
    once: bool,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

/// Loads the configuration named on the command line, or the default one
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()),
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    Ok(config)
}

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

// ============================================================================
// DaemonService struct
// ============================================================================

/// Main daemon service that wires the engine and its drivers
struct DaemonService {
    /// Application configuration loaded from YAML
    config: Config,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    /// Creates adapters and the shared engine, then loads the baseline
    async fn build_engine(&self) -> Result<Arc<SyncEngine>> {
        let local_root = &self.config.sync.local_root;
        tokio::fs::create_dir_all(local_root)
            .await
            .with_context(|| format!("Failed to create local root {}", local_root.display()))?;

        let remote_root = &self.config.remote.root;
        tokio::fs::create_dir_all(remote_root)
            .await
            .with_context(|| format!("Failed to create remote root {}", remote_root.display()))?;

        let settings = EngineSettings::from_config(&self.config)?;
        let state_path = self.config.state_file_path();
        info!(
            local_root = %local_root.display(),
            remote_root = %remote_root.display(),
            state_file = %state_path.display(),
            "Creating sync engine"
        );

        let engine = Arc::new(SyncEngine::new(
            Arc::new(DirectoryRemote::new(remote_root.clone())),
            Arc::new(LocalFileSystemAdapter::new()),
            Arc::new(JsonStateStore::new(state_path)),
            settings,
        ));
        engine.load_state().await;
        Ok(engine)
    }

    /// One full tree pass
    async fn run_once(&self) -> Result<SyncReport> {
        let engine = self.build_engine().await?;
        let report = engine.reconcile_tree().await;
        info!(
            uploads = report.uploads,
            downloads = report.downloads,
            remote_deletions = report.remote_deletions,
            local_deletions = report.local_deletions,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Single pass completed"
        );
        Ok(report)
    }

    /// Runs the watcher dispatcher and both polling loops until shutdown
    async fn run(&self) -> Result<()> {
        let engine = self.build_engine().await?;

        // The watcher must outlive the scheduler; dropping it closes the channel.
        let mut watcher_parts = None;
        if self.config.watcher.enabled {
            let (mut watcher, change_rx) = FileWatcher::new(
                self.config.watcher.channel_capacity,
                self.config.sync.state_file_name.clone(),
            )?;
            watcher.watch(&self.config.sync.local_root)?;

            let scheduler = SyncScheduler::new(
                change_rx,
                Arc::clone(&engine),
                Duration::from_millis(self.config.watcher.debounce_ms),
                self.shutdown.clone(),
            );
            watcher_parts = Some((watcher, tokio::spawn(scheduler.run())));
        } else {
            warn!("File watcher disabled, relying on polling only");
        }

        let poller = RemoteChangePoller::new(
            Arc::clone(&engine),
            PollerSettings::from_config(&self.config),
            self.shutdown.clone(),
        )
        .spawn();

        self.shutdown.cancelled().await;
        info!("Shutdown signal received, stopping sync tasks");

        poller.join().await;
        if let Some((watcher, scheduler)) = watcher_parts {
            if let Err(e) = scheduler.await {
                error!(error = %e, "Scheduler task terminated abnormally");
            }
            drop(watcher);
        }

        info!("Sync tasks stopped");
        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("config error: {e}");
        }
        anyhow::bail!("invalid configuration ({} errors)", errors.len());
    }

    init_tracing(&config);
    info!("Foldsync daemon starting (foldsyncd)");

    let shutdown_token = CancellationToken::new();
    let service = DaemonService::new(config, shutdown_token.clone());

    if args.once {
        let report = service.run_once().await?;
        if !report.is_clean() {
            warn!(errors = report.errors.len(), "Pass finished with errors");
        }
        return Ok(());
    }

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = service.run().await;

    match &result {
        Ok(()) => info!("Foldsync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Foldsync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
