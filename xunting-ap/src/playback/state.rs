//! Playback settings and observable state

use crate::config::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use xunting_common::events::{PlayerState, StatusMessage};

/// Retry and skip timing for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// Retries per sentence after the first failed attempt
    pub retry_limit: u32,
    /// Constant cooldown before each retry
    pub retry_delay: Duration,
    /// How long the skip notice shows before moving on
    pub skip_notice: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            retry_limit: 2,
            retry_delay: Duration::from_millis(1000),
            skip_notice: Duration::from_millis(800),
        }
    }
}

impl From<&PlaybackConfig> for PlaybackSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            retry_limit: config.retry_limit,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            skip_notice: Duration::from_millis(config.skip_notice_ms),
        }
    }
}

/// Point-in-time view of the controller for observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub state: PlayerState,
    pub lesson_id: Option<String>,
    pub lesson_title: Option<String>,
    pub cursor: usize,
    pub total: usize,
    pub playing: bool,
    pub looping: bool,
    pub loading: bool,
    pub audio_unlocked: bool,
    pub status: Option<StatusMessage>,
    pub retry_count: u32,
    pub generation: u64,
}

impl PlaybackSnapshot {
    /// Text of the current sentence position, e.g. "3/5"
    pub fn progress(&self) -> String {
        if self.total == 0 {
            "-".to_string()
        } else {
            format!("{}/{}", self.cursor + 1, self.total)
        }
    }
}
