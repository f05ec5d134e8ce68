//! TOML Configuration File Support
//!
//! Configuration for the observer lives in
//! `$XDG_CONFIG_HOME/observer/observer.toml` (or the path in `OBSERVER_CONFIG`).
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [session]
//! auto_start = true
//!
//! [display]
//! agent_slots = 2
//! placeholder = "--"
//! tactic_separator = ", "
//!
//! [reveal]
//! chars_per_tick = 2
//! tick_ms = 30
//!
//! [replay]
//! interval_ms = 250
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[session]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Request an autostart when connecting to an idle upstream
    pub auto_start: Option<bool>,
}

/// `[display]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayToml {
    /// Number of agent seats on the page
    pub agent_slots: Option<u8>,
    /// Text shown for absent values
    pub placeholder: Option<String>,
    /// Separator between tactics
    pub tactic_separator: Option<String>,
}

/// `[reveal]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealToml {
    /// Characters revealed per tick
    pub chars_per_tick: Option<usize>,
    /// Tick period in milliseconds
    pub tick_ms: Option<u64>,
}

/// `[replay]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayToml {
    /// Delay between replayed frames in milliseconds
    pub interval_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverToml {
    /// Session section
    pub session: SessionToml,
    /// Display section
    pub display: DisplayToml,
    /// Reveal section
    pub reveal: RevealToml,
    /// Replay section
    pub replay: ReplayToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// How structural state is turned into text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Number of agent seats
    pub agent_slots: u8,
    /// Text shown for absent values
    pub placeholder: String,
    /// Separator between tactics
    pub tactic_separator: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            agent_slots: 2,
            placeholder: "--".to_string(),
            tactic_separator: ", ".to_string(),
        }
    }
}

/// Dialogue reveal pacing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealConfig {
    /// Characters revealed per tick
    pub chars_per_tick: usize,
    /// Tick period
    pub tick: Duration,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            chars_per_tick: 2,
            tick: Duration::from_millis(30),
        }
    }
}

/// Centralized configuration for the observer
#[derive(Clone, Debug)]
pub struct ObserverConfig {
    /// Request an autostart on connect
    pub auto_start: bool,
    /// Display settings
    pub display: DisplayConfig,
    /// Reveal settings
    pub reveal: RevealConfig,
    /// Delay between replayed frames
    pub replay_interval: Duration,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            display: DisplayConfig::default(),
            reveal: RevealConfig::default(),
            replay_interval: Duration::from_millis(250),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ObserverConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Reject values the core cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.agent_slots == 0 {
            return Err(ConfigError::ValidationError(
                "display.agent_slots must be at least 1".to_string(),
            ));
        }
        if self.reveal.chars_per_tick == 0 {
            return Err(ConfigError::ValidationError(
                "reveal.chars_per_tick must be at least 1".to_string(),
            ));
        }
        if self.reveal.tick.is_zero() {
            return Err(ConfigError::ValidationError(
                "reveal.tick_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// `OBSERVER_CONFIG` if set, else `$XDG_CONFIG_HOME/observer/observer.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("OBSERVER_CONFIG")
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|p| p.join("observer").join("observer.toml")))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged values fail validation. A missing config file is not an error.
pub fn load_config() -> Result<ObserverConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path plus the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ObserverConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ObserverConfig, ConfigError> {
    let mut config = ObserverConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ObserverToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ObserverConfig, toml: &ObserverToml) {
    if let Some(auto_start) = toml.session.auto_start {
        config.auto_start = auto_start;
    }

    if let Some(slots) = toml.display.agent_slots {
        config.display.agent_slots = slots;
    }
    if let Some(ref placeholder) = toml.display.placeholder {
        config.display.placeholder.clone_from(placeholder);
    }
    if let Some(ref separator) = toml.display.tactic_separator {
        config.display.tactic_separator.clone_from(separator);
    }

    if let Some(chars) = toml.reveal.chars_per_tick {
        config.reveal.chars_per_tick = chars;
    }
    if let Some(ms) = toml.reveal.tick_ms {
        config.reveal.tick = Duration::from_millis(ms);
    }

    if let Some(ms) = toml.replay.interval_ms {
        config.replay_interval = Duration::from_millis(ms);
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ObserverConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(value) = env("OBSERVER_AUTO_START") {
        config.auto_start = value != "0" && value.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(value) = env("OBSERVER_REVEAL_CHARS") {
        if let Ok(chars) = value.parse::<usize>() {
            config.reveal.chars_per_tick = chars;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(value) = env("OBSERVER_REPLAY_INTERVAL_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.replay_interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Autostart override
    pub auto_start: Option<bool>,
    /// Replay interval override (milliseconds)
    pub replay_interval_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set autostart override
    #[must_use]
    pub fn with_auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = Some(enabled);
        self
    }

    /// Set replay interval override
    #[must_use]
    pub fn with_replay_interval_ms(mut self, ms: u64) -> Self {
        self.replay_interval_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ObserverConfig) {
        if self.auto_start.is_some() || self.replay_interval_ms.is_some() {
            config.source = ConfigSource::Cli;
        }
        if let Some(enabled) = self.auto_start {
            config.auto_start = enabled;
        }
        if let Some(ms) = self.replay_interval_ms {
            config.replay_interval = Duration::from_millis(ms);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
