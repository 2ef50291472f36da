//! Shared application state
//!
//! Thread-safe state read by the schedule matcher and the interaction layer.
//! Playback state is not here: the controller owns it exclusively.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use xunting_common::events::{EventBus, ViewMode, XuntingEvent};
use xunting_common::store::PersistedState;
use xunting_common::{Lesson, Schedule};

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes
pub struct SharedState {
    /// Active view
    pub view: RwLock<ViewMode>,

    /// Lesson the player opens with
    pub current_lesson: RwLock<Lesson>,

    /// Listening schedules, in display order
    pub schedules: RwLock<Vec<Schedule>>,

    /// Auto mode: schedules may force the player open
    pub auto_mode: RwLock<bool>,

    /// Event broadcaster
    pub event_bus: Arc<EventBus>,
}

impl SharedState {
    /// Create shared state from persisted values. View starts at home, auto mode disarmed.
    pub fn new(persisted: PersistedState, event_bus: Arc<EventBus>) -> Self {
        Self {
            view: RwLock::new(ViewMode::Home),
            current_lesson: RwLock::new(persisted.current_lesson),
            schedules: RwLock::new(persisted.schedules),
            auto_mode: RwLock::new(false),
            event_bus,
        }
    }

    /// Broadcast an event to all listeners
    pub fn broadcast_event(&self, event: XuntingEvent) {
        self.event_bus.emit_lossy(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<XuntingEvent> {
        self.event_bus.subscribe()
    }

    pub async fn get_view(&self) -> ViewMode {
        *self.view.read().await
    }

    pub async fn set_view(&self, view: ViewMode) {
        let mut current = self.view.write().await;
        if *current != view {
            *current = view;
            self.broadcast_event(XuntingEvent::ViewChanged {
                view,
                timestamp: xunting_common::time::now(),
            });
        }
    }

    pub async fn get_current_lesson(&self) -> Lesson {
        self.current_lesson.read().await.clone()
    }

    pub async fn set_current_lesson(&self, lesson: Lesson) {
        *self.current_lesson.write().await = lesson;
    }

    pub async fn get_schedules(&self) -> Vec<Schedule> {
        self.schedules.read().await.clone()
    }

    pub async fn is_auto_mode(&self) -> bool {
        *self.auto_mode.read().await
    }

    pub async fn set_auto_mode(&self, armed: bool) {
        let mut current = self.auto_mode.write().await;
        if *current != armed {
            *current = armed;
            self.broadcast_event(XuntingEvent::AutoModeChanged {
                armed,
                timestamp: xunting_common::time::now(),
            });
        }
    }

    /// The subset of state that survives a restart
    pub async fn persisted(&self) -> PersistedState {
        PersistedState {
            current_lesson: self.get_current_lesson().await,
            schedules: self.get_schedules().await,
        }
    }
}
