//! Event types for the Xunting event system
//!
//! Provides shared event definitions and the EventBus used by the player,
//! the schedule matcher and any front end observing them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Playback controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// No lesson loaded
    Idle,
    /// Lesson loaded, audio output still locked by autoplay policy
    AwaitingUnlock,
    /// Synthesis request in flight for the current sentence
    FetchingAudio,
    /// Current sentence is rendering
    Playing,
    /// Synthesis failed, waiting out the retry cooldown
    RetryPending,
    /// Retries exhausted, showing the skip notice before advancing
    SkipPending,
    /// Lesson loaded and audio unlocked, but playback paused
    Paused,
    /// Last sentence done
    Finished,
}

impl PlayerState {
    /// States in which the controller is working through the lesson
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlayerState::FetchingAudio
                | PlayerState::Playing
                | PlayerState::RetryPending
                | PlayerState::SkipPending
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::AwaitingUnlock => write!(f, "awaiting_unlock"),
            PlayerState::FetchingAudio => write!(f, "fetching_audio"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::RetryPending => write!(f, "retry_pending"),
            PlayerState::SkipPending => write!(f, "skip_pending"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Finished => write!(f, "finished"),
        }
    }
}

/// Short-lived, human-readable status shown over the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusMessage {
    ReadingAloud,
    Retrying { attempt: u32 },
    Skipping,
    Finished,
    UnlockRequired,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMessage::ReadingAloud => write!(f, "Reading aloud..."),
            StatusMessage::Retrying { attempt } => write!(f, "Retrying ({})...", attempt),
            StatusMessage::Skipping => write!(f, "Skipping this sentence"),
            StatusMessage::Finished => write!(f, "Lesson complete"),
            StatusMessage::UnlockRequired => {
                write!(f, "Audio is blocked; tap play to allow sound")
            }
        }
    }
}

/// Application view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Home,
    Player,
    Scheduler,
    Library,
    Scanner,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Home => write!(f, "home"),
            ViewMode::Player => write!(f, "player"),
            ViewMode::Scheduler => write!(f, "scheduler"),
            ViewMode::Library => write!(f, "library"),
            ViewMode::Scanner => write!(f, "scanner"),
        }
    }
}

/// Xunting event types
///
/// Broadcast via EventBus; serializable so a front end can consume them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum XuntingEvent {
    /// Controller moved between states
    PlaybackStateChanged {
        old_state: PlayerState,
        new_state: PlayerState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A synthesis request was issued for a sentence
    SentenceStarted {
        lesson_id: String,
        index: usize,
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Status message set (Some) or cleared (None)
    StatusChanged {
        status: Option<StatusMessage>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Every sentence of the lesson has been played or skipped
    LessonFinished {
        lesson_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Application view changed
    ViewChanged {
        view: ViewMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Auto mode armed or disarmed
    AutoModeChanged {
        armed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A schedule matched and forced playback activation
    ScheduleTriggered {
        schedule_id: String,
        schedule_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution built on tokio::broadcast
///
/// Slow subscribers lose the oldest events rather than blocking emitters.
pub struct EventBus {
    tx: broadcast::Sender<XuntingEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<XuntingEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: XuntingEvent,
    ) -> Result<usize, broadcast::error::SendError<XuntingEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: XuntingEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
