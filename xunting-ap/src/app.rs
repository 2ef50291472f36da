//! Application coordinator
//!
//! Ties the views, the playback engine, the schedule matcher and persistence
//! together. Every operation that takes a [`UserGesture`] must be called from
//! direct user interaction.

use crate::audio::UserGesture;
use crate::content::{CatalogLessonSource, LessonSource};
use crate::error::{Error, Result};
use crate::playback::{EngineHandle, PlaybackSnapshot};
use crate::schedule::{ActivationRequest, ScheduleMatcher};
use crate::state::SharedState;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use xunting_common::events::ViewMode;
use xunting_common::schedule::find_schedule_mut;
use xunting_common::store::StateStore;
use xunting_common::{ClockTime, Lesson, Schedule};

pub struct App {
    state: Arc<SharedState>,
    engine: EngineHandle,
    store: Arc<dyn StateStore>,
    catalog: CatalogLessonSource,
    /// Remote lesson generation; None when no generator is configured
    generator: Option<Arc<dyn LessonSource>>,
    matcher: Mutex<ScheduleMatcher>,
}

impl App {
    pub fn new(
        state: Arc<SharedState>,
        engine: EngineHandle,
        store: Arc<dyn StateStore>,
        generator: Option<Arc<dyn LessonSource>>,
        matcher: ScheduleMatcher,
    ) -> Self {
        Self {
            state,
            engine,
            store,
            catalog: CatalogLessonSource::new(),
            generator,
            matcher: Mutex::new(matcher),
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn catalog(&self) -> &CatalogLessonSource {
        &self.catalog
    }

    /// Open the player on the current lesson
    pub async fn open_player(&self) -> Result<()> {
        let lesson = self.state.get_current_lesson().await;
        self.state.set_view(ViewMode::Player).await;
        self.engine.load_lesson(lesson).await
    }

    /// Make `lesson` current, persist it and open the player on it
    pub async fn select_lesson(&self, lesson: Lesson) -> Result<()> {
        if lesson.is_empty() {
            return Err(Error::InvalidInput(format!(
                "lesson '{}' has no sentences",
                lesson.id
            )));
        }
        info!(lesson = %lesson.id, title = %lesson.title, "Lesson selected");
        self.state.set_current_lesson(lesson).await;
        self.persist().await?;
        self.open_player().await
    }

    /// Select a built-in lesson by id
    pub async fn select_catalog_lesson(&self, id: &str) -> Result<()> {
        let lesson = self.catalog.fetch_lesson(id).await?;
        self.select_lesson(lesson).await
    }

    /// Generate a lesson by name and open it
    pub async fn fetch_and_select(&self, name: &str) -> Result<()> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| Error::Config("lesson generation is not configured".to_string()))?;
        let lesson = generator.fetch_lesson(name).await?;
        self.select_lesson(lesson).await
    }

    /// Leave the player: tears the controller down and returns home
    pub async fn leave_player(&self) -> Result<()> {
        self.engine.teardown().await?;
        self.state.set_view(ViewMode::Home).await;
        Ok(())
    }

    pub async fn set_view(&self, view: ViewMode) -> Result<()> {
        if view == ViewMode::Player {
            return self.open_player().await;
        }
        if self.state.get_view().await == ViewMode::Player {
            self.engine.teardown().await?;
        }
        self.state.set_view(view).await;
        Ok(())
    }

    /// Play button: opens the player if needed, then unlocks audio and plays
    pub async fn play(&self, gesture: UserGesture) -> Result<()> {
        if self.state.get_view().await != ViewMode::Player {
            self.open_player().await?;
        }
        self.engine.request_unlock_and_play(gesture).await
    }

    pub async fn snapshot(&self) -> Result<PlaybackSnapshot> {
        self.engine.snapshot().await
    }

    /// Arm or disarm auto mode. Returns the new setting.
    ///
    /// Arming uses the gesture to unlock audio early so a later scheduled
    /// activation can start sound without another interaction.
    pub async fn toggle_auto_mode(&self, gesture: UserGesture) -> Result<bool> {
        let armed = !self.state.is_auto_mode().await;
        self.set_auto_mode(armed, gesture).await?;
        Ok(armed)
    }

    pub async fn set_auto_mode(&self, armed: bool, gesture: UserGesture) -> Result<()> {
        let mut matcher = self.matcher.lock().await;
        if armed {
            matcher.arm();
            self.state.set_auto_mode(true).await;
            if let Err(e) = self.engine.prime_output(gesture).await {
                warn!("Could not unlock audio while arming auto mode: {}", e);
            }
        } else {
            matcher.disarm();
            self.state.set_auto_mode(false).await;
        }
        Ok(())
    }

    /// Open the player for a matched schedule
    pub async fn handle_activation(&self, request: ActivationRequest) -> Result<()> {
        if !self.state.is_auto_mode().await {
            debug!(schedule = %request.schedule_id, "Ignoring activation while disarmed");
            return Ok(());
        }
        if self.state.get_view().await == ViewMode::Player {
            return Ok(());
        }
        info!(
            schedule = %request.schedule_id,
            name = %request.schedule_name,
            at = %request.moment,
            "Scheduled activation"
        );
        self.open_player().await
    }

    /// Serve activation requests until the matcher side closes
    pub async fn run_activations(self: Arc<Self>, mut requests: mpsc::Receiver<ActivationRequest>) {
        while let Some(request) = requests.recv().await {
            if let Err(e) = self.handle_activation(request).await {
                warn!("Scheduled activation failed: {}", e);
            }
        }
        debug!("Activation channel closed");
    }

    pub async fn schedules(&self) -> Vec<Schedule> {
        self.state.get_schedules().await
    }

    pub async fn toggle_schedule(&self, id: &str) -> Result<()> {
        self.edit_schedule(id, |s| {
            s.toggle_enabled();
            Ok(())
        })
        .await
    }

    pub async fn toggle_schedule_day(&self, id: &str, day: u8) -> Result<()> {
        self.edit_schedule(id, |s| s.toggle_day(day)).await
    }

    pub async fn set_schedule_times(&self, id: &str, start: ClockTime, end: ClockTime) -> Result<()> {
        self.edit_schedule(id, |s| {
            s.set_times(start, end);
            Ok(())
        })
        .await
    }

    /// Add a schedule with a fresh id. Returns the id.
    pub async fn add_schedule(
        &self,
        name: &str,
        start: ClockTime,
        end: ClockTime,
        days: Vec<u8>,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let schedule = Schedule::new(id.clone(), name, start, end, days)?;
        self.state.schedules.write().await.push(schedule);
        self.persist().await?;
        info!(schedule = %id, "Schedule added");
        Ok(id)
    }

    pub async fn remove_schedule(&self, id: &str) -> Result<()> {
        {
            let mut schedules = self.state.schedules.write().await;
            let before = schedules.len();
            schedules.retain(|s| s.id != id);
            if schedules.len() == before {
                return Err(xunting_common::Error::NotFound(format!("schedule '{}'", id)).into());
            }
        }
        self.persist().await?;
        info!(schedule = id, "Schedule removed");
        Ok(())
    }

    async fn edit_schedule<F>(&self, id: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Schedule) -> xunting_common::Result<()>,
    {
        {
            let mut schedules = self.state.schedules.write().await;
            edit(find_schedule_mut(&mut schedules, id)?)?;
        }
        self.persist().await?;
        debug!(schedule = id, "Schedule updated");
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let persisted = self.state.persisted().await;
        self.store.save(&persisted)?;
        Ok(())
    }
}
