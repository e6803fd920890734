//! Configuration loading
//!
//! Bootstrap configuration lives in a single TOML file. Every field has a
//! compiled default, so a missing file (or a partial one) still starts the
//! scheduler; only a malformed file is an error.
//!
//! # Config file lookup priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`BARD_CONFIG`)
//! 3. Platform config directory (`~/.config/bard/config.toml` on Linux)
//! 4. Compiled defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "BARD_CONFIG";

/// Per-session queue capacity
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Playlist ingestion only considers this many listed items
pub const DEFAULT_MAX_PLAYLIST_ITEMS: usize = 20;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub player: PlayerSettings,
    pub resolver: ResolverSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// How background ingestion treats playlist entries after the first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionMode {
    /// Resolve every entry in the background; failures are counted as skipped
    #[default]
    Eager,
    /// Queue raw entries; the driver resolves each one right before playback
    Lazy,
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Maximum queued tracks per session
    pub max_queue_size: usize,
    /// Interval between idle-wait polls while ingestion is still running
    pub idle_poll_interval_ms: u64,
    /// Number of idle-wait polls before giving up and disconnecting
    pub idle_poll_attempts: u32,
    /// Playlist entries considered per request (first one included)
    pub max_playlist_items: usize,
    pub ingestion_mode: IngestionMode,
    /// Broadcast buffer for the event bus
    pub event_bus_capacity: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            idle_poll_interval_ms: 1000,
            idle_poll_attempts: 5,
            max_playlist_items: DEFAULT_MAX_PLAYLIST_ITEMS,
            ingestion_mode: IngestionMode::Eager,
            event_bus_capacity: 100,
        }
    }
}

impl PlayerSettings {
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }
}

/// Settings handed to the media resolution backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Resolver executable (looked up on PATH when not absolute)
    pub program: String,
    /// Format preference fallback chain
    pub format: String,
    /// Playlist item range limit (items 1..=N)
    pub playlist_items: usize,
    pub socket_timeout_secs: u64,
    pub retries: u32,
    /// Optional cookies file for restricted media
    pub cookies_file: Option<PathBuf>,
    pub force_ipv4: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            format: "bestaudio/best".to_string(),
            playlist_items: DEFAULT_MAX_PLAYLIST_ITEMS,
            socket_timeout_secs: 15,
            retries: 3,
            cookies_file: None,
            force_ipv4: true,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve the config file location and load it, falling back to defaults
    ///
    /// A missing file is not an error: it is logged and defaults are used.
    /// A file that exists but cannot be parsed is an error.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.player.max_queue_size == 0 {
            return Err(Error::Config("player.max_queue_size must be at least 1".to_string()));
        }
        if self.player.idle_poll_interval_ms == 0 {
            return Err(Error::Config(
                "player.idle_poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.player.idle_poll_attempts == 0 {
            return Err(Error::Config(
                "player.idle_poll_attempts must be at least 1".to_string(),
            ));
        }
        if self.player.max_playlist_items == 0 {
            return Err(Error::Config(
                "player.max_playlist_items must be at least 1".to_string(),
            ));
        }
        if self.resolver.playlist_items == 0 {
            return Err(Error::Config(
                "resolver.playlist_items must be at least 1".to_string(),
            ));
        }
        if self.resolver.program.trim().is_empty() {
            return Err(Error::Config("resolver.program must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Find the config file path following the lookup priority
///
/// Returns `None` only when no explicit path was given and the platform
/// default does not exist.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bard").join("config.toml"))
}
