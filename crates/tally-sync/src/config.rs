//! # Cache Configuration
//!
//! Configuration management for the cache engine and its agent.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_RELOAD_MERGE=overwrite                                       │
//! │     TALLY_FLUSH_INTERVAL_SECS=30                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally/tally.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.tally.tally/tally.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     rebase_pending merge, forced reload on connect, no timers          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # tally.toml
//! [session]
//! name = "main-menu"
//!
//! [reload]
//! force_on_start = true
//! merge = "rebase_pending"  # rebase_pending | overwrite
//! interval_secs = 0         # 0 disables periodic reloads
//! retry_initial_backoff_ms = 500
//! retry_max_backoff_secs = 60
//! retry_max_elapsed_secs = 300
//!
//! [flush]
//! on_connect = true
//! interval_secs = 0
//!
//! [bridge]
//! interface_name = "__google_play_events"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bridge::DEFAULT_INTERFACE_NAME;
use crate::error::{TallyError, TallyResult};

// =============================================================================
// Reload Merge
// =============================================================================

/// How a reload treats ledger amounts still waiting for replay.
///
/// ## Merge Behavior
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Local: e1 = 18 (fetched 10, +8 pending)     Remote returns: e1 = 10   │
/// │                                                                         │
/// │  REBASE_PENDING (default)           │  OVERWRITE                        │
/// │  ─────────────────────────          │  ──────────                       │
/// │  e1 = 10 + 8 = 18                   │  e1 = 10                          │
/// │  pending 8 still visible locally    │  remote value wins outright       │
/// │  until the next flush               │                                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadMerge {
    /// Add each key's pending ledger amount on top of the fetched value.
    #[default]
    RebasePending,

    /// Replace the local value with the fetched value.
    Overwrite,
}

impl std::fmt::Display for ReloadMerge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReloadMerge::RebasePending => write!(f, "rebase_pending"),
            ReloadMerge::Overwrite => write!(f, "overwrite"),
        }
    }
}

impl std::str::FromStr for ReloadMerge {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rebase_pending" | "rebase" => Ok(ReloadMerge::RebasePending),
            "overwrite" | "replace" => Ok(ReloadMerge::Overwrite),
            other => Err(TallyError::InvalidConfig(format!(
                "Unknown reload merge: '{}'. Valid options: rebase_pending, overwrite",
                other
            ))),
        }
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Labels the cache session in logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_name")]
    pub name: String,
}

fn default_session_name() -> String {
    "default".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            name: default_session_name(),
        }
    }
}

// =============================================================================
// Reload Settings
// =============================================================================

/// Reload behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadSettings {
    /// Bypass the service-side cache on the reload that follows a connect.
    #[serde(default = "default_true")]
    pub force_on_start: bool,

    /// How fetched values combine with pending ledger amounts.
    #[serde(default)]
    pub merge: ReloadMerge,

    /// Interval between periodic reloads (seconds). 0 disables them.
    #[serde(default)]
    pub interval_secs: u64,

    /// First retry delay after a failed reload (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub retry_initial_backoff_ms: u64,

    /// Upper bound on a single retry delay (seconds).
    #[serde(default = "default_max_backoff")]
    pub retry_max_backoff_secs: u64,

    /// Give up retrying after this long (seconds). 0 disables retries.
    #[serde(default = "default_max_elapsed")]
    pub retry_max_elapsed_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}
fn default_max_elapsed() -> u64 {
    300
}

impl Default for ReloadSettings {
    fn default() -> Self {
        ReloadSettings {
            force_on_start: true,
            merge: ReloadMerge::default(),
            interval_secs: 0,
            retry_initial_backoff_ms: default_initial_backoff(),
            retry_max_backoff_secs: default_max_backoff(),
            retry_max_elapsed_secs: default_max_elapsed(),
        }
    }
}

impl ReloadSettings {
    /// Returns the periodic reload interval, if enabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }

    /// Returns true if failed reloads should be retried.
    pub fn retries_enabled(&self) -> bool {
        self.retry_max_elapsed_secs > 0
    }
}

// =============================================================================
// Flush Settings
// =============================================================================

/// Flush behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushSettings {
    /// Replay pending deltas as soon as a remote client is attached.
    #[serde(default = "default_true")]
    pub on_connect: bool,

    /// Interval between periodic flushes (seconds). 0 disables them.
    #[serde(default)]
    pub interval_secs: u64,
}

impl Default for FlushSettings {
    fn default() -> Self {
        FlushSettings {
            on_connect: true,
            interval_secs: 0,
        }
    }
}

impl FlushSettings {
    /// Returns the periodic flush interval, if enabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

// =============================================================================
// Bridge Settings
// =============================================================================

/// Settings for the JavaScript-facing bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Name the bridge object is exposed under in the web view.
    #[serde(default = "default_interface_name")]
    pub interface_name: String,
}

fn default_interface_name() -> String {
    DEFAULT_INTERFACE_NAME.to_string()
}

impl Default for BridgeSettings {
    fn default() -> Self {
        BridgeSettings {
            interface_name: default_interface_name(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete cache configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub reload: ReloadSettings,

    #[serde(default)]
    pub flush: FlushSettings,

    #[serde(default)]
    pub bridge: BridgeSettings,
}

impl TallyConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tally.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> TallyResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading tally config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load tally config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> TallyResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| TallyError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TallyError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| TallyError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Tally config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> TallyResult<()> {
        if self.bridge.interface_name.trim().is_empty() {
            return Err(TallyError::InvalidConfig(
                "bridge.interface_name must not be empty".into(),
            ));
        }

        if self.reload.retries_enabled() && self.reload.retry_initial_backoff_ms == 0 {
            return Err(TallyError::InvalidConfig(
                "reload.retry_initial_backoff_ms must be greater than 0 when retries are enabled"
                    .into(),
            ));
        }

        if self.reload.retries_enabled()
            && self.reload.retry_max_backoff_secs.saturating_mul(1000)
                < self.reload.retry_initial_backoff_ms
        {
            return Err(TallyError::InvalidConfig(
                "reload.retry_max_backoff_secs must not be below the initial backoff".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("TALLY_SESSION_NAME") {
            self.session.name = name;
        }

        if let Ok(merge) = std::env::var("TALLY_RELOAD_MERGE") {
            match merge.parse() {
                Ok(parsed) => {
                    debug!(merge = %merge, "Overriding reload merge from environment");
                    self.reload.merge = parsed;
                }
                Err(_) => warn!(merge = %merge, "Unknown reload merge in environment"),
            }
        }

        if let Ok(secs) = std::env::var("TALLY_RELOAD_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.reload.interval_secs = s;
            }
        }

        if let Ok(secs) = std::env::var("TALLY_FLUSH_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.flush.interval_secs = s;
            }
        }

        if let Ok(name) = std::env::var("TALLY_BRIDGE_INTERFACE") {
            debug!(interface = %name, "Overriding bridge interface from environment");
            self.bridge.interface_name = name;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "tally")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }
}
