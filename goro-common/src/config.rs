//! Configuration management for the Goro services
//!
//! A single TOML file holds bootstrap settings. Every key has a built-in
//! default, so a missing file (or a missing section) never prevents startup.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`GORO_CONFIG`)
//! 3. Platform config dir (`~/.config/goro/config.toml` on Linux)
//! 4. Built-in defaults (no file)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "GORO_CONFIG";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub resolver: ResolverConfig,
    pub ambient: AmbientConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// HTTP control surface
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: default_port(),
        }
    }
}

/// Source resolver settings
///
/// `catalog_*` applies to metadata-driven platforms (format selection step),
/// `direct_*` to plain file links. One attempt means no retry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub catalog_max_attempts: u32,
    pub catalog_backoff_ms: u64,
    pub direct_max_attempts: u32,
    pub direct_backoff_ms: u64,
    /// Lowercase file extensions accepted as direct links
    pub direct_extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("goro/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_ms: 30_000,
            catalog_max_attempts: 3,
            catalog_backoff_ms: 2_000,
            direct_max_attempts: 1,
            direct_backoff_ms: 2_000,
            direct_extensions: ["mp3", "wav", "ogg", "flac", "mp4", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ResolverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Ambient filler sound settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmbientConfig {
    pub enabled: bool,
    pub sounds_folder: PathBuf,
    /// Lowercase extensions of playable sound files
    pub sound_extensions: Vec<String>,
    pub idle_min_ms: u64,
    pub idle_max_ms: u64,
    /// Delay before joining a channel whose only occupant just arrived
    pub join_delay_min_ms: u64,
    pub join_delay_max_ms: u64,
    /// Pause after joining so the channel membership settles
    pub settle_ms: u64,
    /// Non-controller participants required before sounds play
    pub min_listeners: usize,
    /// Upper bound on a single sound; longer playback is cut
    pub max_sound_ms: u64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sounds_folder: PathBuf::from("./resources/sounds"),
            sound_extensions: vec!["mp3".to_string()],
            idle_min_ms: 300_000,
            idle_max_ms: 2_700_000,
            join_delay_min_ms: 1_000,
            join_delay_max_ms: 30_000,
            settle_ms: 500,
            min_listeners: 2,
            max_sound_ms: 120_000,
        }
    }
}

impl AmbientConfig {
    pub fn idle_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.idle_min_ms),
            Duration::from_millis(self.idle_max_ms),
        )
    }

    pub fn join_delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.join_delay_min_ms),
            Duration::from_millis(self.join_delay_max_ms),
        )
    }
}

fn default_port() -> u16 {
    5750
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse and validate configuration text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file
    ///
    /// Unlike [`TomlConfig::load`], a missing file is an error here.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded TOML configuration from {}", path.display());
        Ok(config)
    }

    /// Locate and load configuration with graceful degradation
    ///
    /// An explicitly named file (CLI or env) must exist and parse. The platform
    /// default location is optional; when absent, built-in defaults are used.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                warn!(
                    "No config file at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject ranges and counts the services cannot honor
    pub fn validate(&self) -> Result<()> {
        let r = &self.resolver;
        if r.catalog_max_attempts == 0 || r.direct_max_attempts == 0 {
            return Err(Error::Config(
                "resolver attempts must be at least 1".to_string(),
            ));
        }

        let a = &self.ambient;
        if a.idle_min_ms > a.idle_max_ms {
            return Err(Error::Config(format!(
                "ambient.idle_min_ms ({}) exceeds idle_max_ms ({})",
                a.idle_min_ms, a.idle_max_ms
            )));
        }
        if a.join_delay_min_ms > a.join_delay_max_ms {
            return Err(Error::Config(format!(
                "ambient.join_delay_min_ms ({}) exceeds join_delay_max_ms ({})",
                a.join_delay_min_ms, a.join_delay_max_ms
            )));
        }
        if a.min_listeners == 0 {
            return Err(Error::Config(
                "ambient.min_listeners must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("goro").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        assert_eq!(default_port(), 5750);
    }

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn test_defaults_validate() {
        assert!(TomlConfig::default().validate().is_ok());
    }

    #[test]
    fn test_direct_links_are_not_retried_by_default() {
        let resolver = ResolverConfig::default();
        assert_eq!(resolver.direct_max_attempts, 1);
        assert_eq!(resolver.catalog_max_attempts, 3);
        assert_eq!(resolver.catalog_backoff_ms, 2_000);
    }
}
