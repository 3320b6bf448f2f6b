//! Configuration module for foldsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for foldsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub watcher: WatcherConfig,
    pub poller: PollerConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root of the local tree kept in sync.
    pub local_root: PathBuf,
    /// Remote folder id that mirrors `local_root`.
    pub remote_root_id: String,
    /// Name of the baseline file inside `local_root`, hidden from listings.
    pub state_file_name: String,
    /// Explicit baseline file location, overriding `local_root/state_file_name`.
    pub state_file: Option<PathBuf>,
    /// Timestamps closer than this (ms) are considered equal.
    pub conflict_threshold_ms: u64,
    /// Seconds a freshly uploaded file is exempt from per-file checks.
    pub upload_suppression_secs: u64,
}

/// Local change watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Whether the daemon watches the local tree at all.
    pub enabled: bool,
    /// Quiet period (ms) after the last create/modify before a file is synced.
    pub debounce_ms: u64,
    /// Capacity of the watcher event channel.
    pub channel_capacity: usize,
}

/// Remote polling cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Seconds between full remote-root listing checks.
    pub full_listing_interval_secs: u64,
    /// Seconds between full tree reconciliations.
    pub reconcile_interval_secs: u64,
    /// Pause (ms) before each reconciliation tick and before local cleanup.
    pub settle_delay_ms: u64,
}

/// Remote backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Directory served as the remote store.
    pub root: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/foldsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("foldsync")
            .join("config.yaml")
    }

    /// Where the baseline snapshot is persisted.
    pub fn state_file_path(&self) -> PathBuf {
        match &self.sync.state_file {
            Some(path) => path.clone(),
            None => self.sync.local_root.join(&self.sync.state_file_name),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Foldsync"),
            remote_root_id: "/".to_string(),
            state_file_name: ".sync_state.json".to_string(),
            state_file: None,
            conflict_threshold_ms: 2000,
            upload_suppression_secs: 10,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
            channel_capacity: 1024,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            full_listing_interval_secs: 600,
            reconcile_interval_secs: 30,
            settle_delay_ms: 2000,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("FoldsyncRemote"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"poller.reconcile_interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn must_be_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.remote_root_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.remote_root_id".into(),
                message: "must not be empty".into(),
            });
        }
        let name = self.sync.state_file_name.as_str();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            errors.push(ValidationError {
                field: "sync.state_file_name".into(),
                message: format!("must be a plain file name, got '{name}'"),
            });
        }
        must_be_positive(
            &mut errors,
            "sync.upload_suppression_secs",
            self.sync.upload_suppression_secs,
        );

        // --- watcher ---
        must_be_positive(&mut errors, "watcher.debounce_ms", self.watcher.debounce_ms);
        must_be_positive(
            &mut errors,
            "watcher.channel_capacity",
            self.watcher.channel_capacity as u64,
        );

        // --- poller ---
        must_be_positive(
            &mut errors,
            "poller.full_listing_interval_secs",
            self.poller.full_listing_interval_secs,
        );
        must_be_positive(
            &mut errors,
            "poller.reconcile_interval_secs",
            self.poller.reconcile_interval_secs,
        );

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use foldsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .local_root(PathBuf::from("/home/user/Foldsync"))
///     .reconcile_interval_secs(60)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn local_root(mut self, root: PathBuf) -> Self {
        self.config.sync.local_root = root;
        self
    }

    pub fn remote_root_id(mut self, id: impl Into<String>) -> Self {
        self.config.sync.remote_root_id = id.into();
        self
    }

    pub fn state_file(mut self, path: PathBuf) -> Self {
        self.config.sync.state_file = Some(path);
        self
    }

    pub fn conflict_threshold_ms(mut self, ms: u64) -> Self {
        self.config.sync.conflict_threshold_ms = ms;
        self
    }

    pub fn upload_suppression_secs(mut self, secs: u64) -> Self {
        self.config.sync.upload_suppression_secs = secs;
        self
    }

    // --- watcher ---

    pub fn watcher_enabled(mut self, enabled: bool) -> Self {
        self.config.watcher.enabled = enabled;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.watcher.debounce_ms = ms;
        self
    }

    // --- poller ---

    pub fn full_listing_interval_secs(mut self, secs: u64) -> Self {
        self.config.poller.full_listing_interval_secs = secs;
        self
    }

    pub fn reconcile_interval_secs(mut self, secs: u64) -> Self {
        self.config.poller.reconcile_interval_secs = secs;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.poller.settle_delay_ms = ms;
        self
    }

    // --- remote ---

    pub fn remote_root(mut self, root: PathBuf) -> Self {
        self.config.remote.root = root;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
