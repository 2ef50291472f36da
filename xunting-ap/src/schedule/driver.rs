//! Schedule matcher task
//!
//! While armed, evaluates the schedules immediately and then on a fixed
//! interval. A match outside the player view produces an [`ActivationRequest`];
//! the matcher never touches playback itself. Minutes that pass while disarmed
//! are not back-filled.

use super::matcher::find_matching_schedule;
use crate::state::SharedState;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use xunting_common::events::{ViewMode, XuntingEvent};
use xunting_common::time::minute_key;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        xunting_common::time::now_local()
    }
}

/// Request to open the player because a schedule started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub schedule_id: String,
    pub schedule_name: String,
    pub moment: NaiveDateTime,
}

pub struct ScheduleMatcher {
    state: Arc<SharedState>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    requests: mpsc::Sender<ActivationRequest>,
    task: Option<JoinHandle<()>>,
}

impl ScheduleMatcher {
    pub fn new(
        state: Arc<SharedState>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        requests: mpsc::Sender<ActivationRequest>,
    ) -> Self {
        Self {
            state,
            clock,
            interval: interval.clamp(Duration::from_secs(1), Duration::from_secs(60)),
            requests,
            task: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start evaluating. Arming an armed matcher is a no-op.
    pub fn arm(&mut self) {
        if self.is_armed() {
            return;
        }

        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let requests = self.requests.clone();
        let period = self.interval;

        info!(interval_secs = period.as_secs(), "Schedule matcher armed");
        self.task = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_fired: Option<(String, i64)> = None;

            loop {
                // First tick completes immediately
                tick.tick().await;
                if !evaluate(&state, clock.as_ref(), &requests, &mut last_fired).await {
                    break;
                }
            }
        }));
    }

    /// Stop evaluating. Nothing fires until armed again.
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Schedule matcher disarmed");
        }
    }
}

impl Drop for ScheduleMatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// One evaluation. Returns false once nobody is listening for requests.
async fn evaluate(
    state: &SharedState,
    clock: &dyn Clock,
    requests: &mpsc::Sender<ActivationRequest>,
    last_fired: &mut Option<(String, i64)>,
) -> bool {
    let moment = clock.now();
    let schedules = state.get_schedules().await;
    let Some(schedule) = find_matching_schedule(&schedules, &moment) else {
        return true;
    };

    // The interval samples each minute more than once
    let fired = (schedule.id.clone(), minute_key(&moment));
    if last_fired.as_ref() == Some(&fired) {
        return true;
    }

    // Only a sent request uses up the minute
    if state.get_view().await == ViewMode::Player {
        debug!(schedule = %schedule.id, "Schedule matched while player is open");
        return true;
    }
    *last_fired = Some(fired);

    info!(schedule = %schedule.id, name = %schedule.name, "Schedule matched, activating player");
    state.broadcast_event(XuntingEvent::ScheduleTriggered {
        schedule_id: schedule.id.clone(),
        schedule_name: schedule.name.clone(),
        timestamp: xunting_common::time::now(),
    });

    let request = ActivationRequest {
        schedule_id: schedule.id.clone(),
        schedule_name: schedule.name.clone(),
        moment,
    };
    if requests.send(request).await.is_err() {
        warn!("Activation receiver dropped, stopping schedule matcher");
        return false;
    }
    true
}
