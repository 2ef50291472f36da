//! Configuration management for xunting-ap
//!
//! Bootstrap configuration comes from a TOML file. Sources, highest priority first:
//!
//! 1. Command-line arguments
//! 2. Environment variables (`XUNTING_CONFIG`, `GEMINI_API_KEY` / `API_KEY`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing config file is not an error; the player runs on defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variables consulted for the speech API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Path of the persisted state file (default: data folder)
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Output device name (default device if absent)
    #[serde(default)]
    pub audio_device: Option<String>,
}

/// Remote speech synthesis and lesson generation
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_content_model")]
    pub content_model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            tts_model: default_tts_model(),
            voice: default_voice(),
            content_model: default_content_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SpeechConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Sentence retry and skip timing
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_skip_notice_ms")]
    pub skip_notice_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retry_limit: default_retry_limit(),
            retry_delay_ms: default_retry_delay_ms(),
            skip_notice_ms: default_skip_notice_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between schedule evaluations, clamped to 1..=60
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Poll interval, never coarser than one minute so no start minute is missed
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.clamp(1, 60))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_voice() -> String {
    "Kore".to_string()
}

fn default_content_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_limit() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_skip_notice_ms() -> u64 {
    800
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load configuration from the resolved path, or defaults if there is none
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                info!("No config file found, using built-in defaults");
                Self::default()
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Fill the API key from the environment when the file leaves it unset
    fn apply_env(&mut self) {
        if self.speech.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            return;
        }
        self.speech.api_key = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty());
    }

    fn validate(&self) -> Result<()> {
        if self.speech.timeout_secs == 0 {
            return Err(Error::Config("speech.timeout_secs must be positive".to_string()));
        }
        if !(1..=60).contains(&self.scheduler.poll_interval_secs) {
            warn!(
                "scheduler.poll_interval_secs = {} is outside 1..=60, clamping",
                self.scheduler.poll_interval_secs
            );
        }
        Ok(())
    }
}
