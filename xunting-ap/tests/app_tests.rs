//! Application coordinator tests
//!
//! Wires the real engine, state and file store to the fake output and a
//! scripted speech client.

mod helpers;

use async_trait::async_trait;
use helpers::{fast_settings, june, test_lesson, FakeOutput, ManualClock, OutputProbe, ScriptedSpeech};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use xunting_ap::app::App;
use xunting_ap::audio::{AudioGate, UserGesture};
use xunting_ap::content::LessonSource;
use xunting_ap::playback::PlaybackEngine;
use xunting_ap::schedule::{ActivationRequest, ScheduleMatcher};
use xunting_ap::{Error, SharedState};
use xunting_common::events::{EventBus, PlayerState, ViewMode};
use xunting_common::store::{JsonFileStore, PersistedState, StateStore};
use xunting_common::{ClockTime, Lesson};

/// Generator that returns the test lesson under whatever name it is asked for
struct FixedGenerator;

#[async_trait]
impl LessonSource for FixedGenerator {
    async fn fetch_lesson(&self, key: &str) -> xunting_ap::Result<Lesson> {
        let mut lesson = test_lesson(2);
        lesson.id = format!("gen-{}", key);
        lesson.title = key.to_string();
        Ok(lesson)
    }
}

struct Fixture {
    app: Arc<App>,
    probe: Arc<OutputProbe>,
    store: Arc<JsonFileStore>,
    _dir: TempDir,
}

fn fixture(generator: Option<Arc<dyn LessonSource>>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("state.json")));
    let bus = Arc::new(EventBus::new(256));
    let state = Arc::new(SharedState::new(PersistedState::default(), Arc::clone(&bus)));

    let (backend, probe) = FakeOutput::new();
    let engine = PlaybackEngine::spawn(
        AudioGate::new(Arc::new(backend)),
        Arc::new(ScriptedSpeech::succeeding()),
        fast_settings(),
        bus,
    );

    // Sunday night: nothing matches while auto mode is armed in these tests
    let (tx, _rx) = mpsc::channel(8);
    let matcher = ScheduleMatcher::new(
        Arc::clone(&state),
        Arc::new(ManualClock::new(june(9, 23, 59))),
        Duration::from_secs(60),
        tx,
    );

    let app = Arc::new(App::new(
        state,
        engine,
        Arc::clone(&store) as Arc<dyn StateStore>,
        generator,
        matcher,
    ));
    Fixture {
        app,
        probe,
        store,
        _dir: dir,
    }
}

fn saved(f: &Fixture) -> PersistedState {
    f.store.load().unwrap().expect("state was saved")
}

fn breakfast_request() -> ActivationRequest {
    ActivationRequest {
        schedule_id: "1".to_string(),
        schedule_name: "早餐熏听".to_string(),
        moment: june(3, 7, 0),
    }
}

#[tokio::test]
async fn test_selecting_lesson_opens_player_and_persists() {
    let f = fixture(None);

    f.app.select_catalog_lesson("e1").await.unwrap();

    assert_eq!(f.app.state().get_view().await, ViewMode::Player);
    let snapshot = f.app.snapshot().await.unwrap();
    assert_eq!(snapshot.lesson_id.as_deref(), Some("e1"));
    assert_eq!(snapshot.state, PlayerState::AwaitingUnlock);
    assert_eq!(saved(&f).current_lesson.id, "e1");
}

#[tokio::test]
async fn test_unknown_catalog_lesson_rejected() {
    let f = fixture(None);
    let err = f.app.select_catalog_lesson("zz").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(f.app.state().get_view().await, ViewMode::Home);
    assert!(f.store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_requires_generator() {
    let f = fixture(None);
    let err = f.app.fetch_and_select("出师表").await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_fetch_selects_generated_lesson() {
    let f = fixture(Some(Arc::new(FixedGenerator)));

    f.app.fetch_and_select("出师表").await.unwrap();

    assert_eq!(
        f.app.state().get_current_lesson().await.title,
        "出师表"
    );
    assert_eq!(saved(&f).current_lesson.id, "gen-出师表");
    assert_eq!(f.app.state().get_view().await, ViewMode::Player);
}

#[tokio::test]
async fn test_play_from_home_opens_player_and_plays() {
    let f = fixture(None);

    f.app.play(UserGesture::new("test")).await.unwrap();

    assert_eq!(f.app.state().get_view().await, ViewMode::Player);
    let snapshot = f.app.snapshot().await.unwrap();
    assert_eq!(snapshot.lesson_id.as_deref(), Some("l1"));
    assert!(snapshot.playing);
    assert!(snapshot.audio_unlocked);
}

#[tokio::test]
async fn test_leave_player_tears_down() {
    let f = fixture(None);
    f.app.play(UserGesture::new("test")).await.unwrap();

    f.app.leave_player().await.unwrap();

    assert_eq!(f.app.state().get_view().await, ViewMode::Home);
    let snapshot = f.app.snapshot().await.unwrap();
    assert_eq!(snapshot.state, PlayerState::Idle);
    assert!(!snapshot.audio_unlocked);
    assert_eq!(
        f.probe.closed.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_switching_views_away_from_player_tears_down() {
    let f = fixture(None);
    f.app.set_view(ViewMode::Player).await.unwrap();
    assert_eq!(
        f.app.snapshot().await.unwrap().state,
        PlayerState::AwaitingUnlock
    );

    f.app.set_view(ViewMode::Scheduler).await.unwrap();
    assert_eq!(f.app.state().get_view().await, ViewMode::Scheduler);
    assert_eq!(f.app.snapshot().await.unwrap().state, PlayerState::Idle);
}

#[tokio::test]
async fn test_activation_ignored_while_disarmed() {
    let f = fixture(None);
    f.app.handle_activation(breakfast_request()).await.unwrap();
    assert_eq!(f.app.state().get_view().await, ViewMode::Home);
}

#[tokio::test]
async fn test_armed_activation_opens_player_and_plays() {
    let f = fixture(None);

    let armed = f.app.toggle_auto_mode(UserGesture::new("test")).await.unwrap();
    assert!(armed);
    assert!(f.app.state().is_auto_mode().await);

    f.app.handle_activation(breakfast_request()).await.unwrap();

    assert_eq!(f.app.state().get_view().await, ViewMode::Player);
    // Arming unlocked the output, so the lesson starts without another gesture
    let snapshot = f.app.snapshot().await.unwrap();
    assert!(snapshot.playing);
    assert_ne!(snapshot.state, PlayerState::AwaitingUnlock);

    let armed = f.app.toggle_auto_mode(UserGesture::new("test")).await.unwrap();
    assert!(!armed);
}

#[tokio::test]
async fn test_arming_with_refused_output_still_arms() {
    let f = fixture(None);
    f.probe
        .allow_resume
        .store(false, std::sync::atomic::Ordering::SeqCst);

    f.app
        .set_auto_mode(true, UserGesture::new("test"))
        .await
        .unwrap();
    assert!(f.app.state().is_auto_mode().await);

    f.app.handle_activation(breakfast_request()).await.unwrap();
    assert_eq!(f.app.state().get_view().await, ViewMode::Player);
    assert_eq!(
        f.app.snapshot().await.unwrap().state,
        PlayerState::AwaitingUnlock
    );
}

#[tokio::test]
async fn test_activation_loop_serves_requests() {
    let f = fixture(None);
    f.app
        .set_auto_mode(true, UserGesture::new("test"))
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(Arc::clone(&f.app).run_activations(rx));
    tx.send(breakfast_request()).await.unwrap();
    drop(tx);
    task.await.unwrap();

    assert_eq!(f.app.state().get_view().await, ViewMode::Player);
}

#[tokio::test]
async fn test_schedule_edits_persist() {
    let f = fixture(None);

    f.app.toggle_schedule("1").await.unwrap();
    assert!(!saved(&f).schedules[0].enabled);

    f.app.toggle_schedule_day("2", 6).await.unwrap();
    assert_eq!(saved(&f).schedules[1].repeat_days, vec![1, 2, 3, 4, 5, 6]);

    f.app
        .set_schedule_times(
            "2",
            ClockTime::new(11, 45).unwrap(),
            ClockTime::new(12, 30).unwrap(),
        )
        .await
        .unwrap();
    let lunch = saved(&f).schedules[1].clone();
    assert_eq!(lunch.start_time.to_string(), "11:45");
    assert_eq!(lunch.end_time.to_string(), "12:30");

    assert_eq!(f.app.schedules().await, saved(&f).schedules);
}

#[tokio::test]
async fn test_add_and_remove_schedule() {
    let f = fixture(None);

    let id = f
        .app
        .add_schedule(
            "晚读",
            ClockTime::new(20, 0).unwrap(),
            ClockTime::new(20, 30).unwrap(),
            vec![6, 0, 6],
        )
        .await
        .unwrap();

    let schedules = saved(&f).schedules;
    assert_eq!(schedules.len(), 3);
    assert_eq!(schedules[2].id, id);
    assert_eq!(schedules[2].repeat_days, vec![0, 6]);
    assert!(schedules[2].enabled);

    f.app.remove_schedule(&id).await.unwrap();
    assert_eq!(saved(&f).schedules.len(), 2);
}

#[tokio::test]
async fn test_schedule_edit_errors() {
    let f = fixture(None);

    assert!(matches!(
        f.app.toggle_schedule("missing").await,
        Err(Error::Common(xunting_common::Error::NotFound(_)))
    ));
    assert!(matches!(
        f.app.remove_schedule("missing").await,
        Err(Error::Common(xunting_common::Error::NotFound(_)))
    ));
    assert!(f.app.toggle_schedule_day("1", 7).await.is_err());
    assert!(f
        .app
        .add_schedule(
            "bad",
            ClockTime::new(8, 0).unwrap(),
            ClockTime::new(9, 0).unwrap(),
            vec![9],
        )
        .await
        .is_err());

    // Nothing was written for failed edits
    assert!(f.store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_lessons_persist_across_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    {
        let store = JsonFileStore::new(&path);
        let mut state = PersistedState::default();
        state.current_lesson = test_lesson(3);
        store.save(&state).unwrap();
    }

    let reloaded = JsonFileStore::new(&path).load().unwrap().unwrap();
    let state = SharedState::new(reloaded, Arc::new(EventBus::new(8)));
    assert_eq!(state.get_current_lesson().await, test_lesson(3));
    assert!(!state.is_auto_mode().await);
    assert_eq!(state.get_view().await, ViewMode::Home);
}
