//! Sequential playback controller
//!
//! Owns the active lesson, the cursor and the single rendering handle, and
//! drives a lesson one sentence at a time:
//!
//! ```text
//! Idle ──load──▶ AwaitingUnlock ──unlock──▶ FetchingAudio ──audio──▶ Playing
//!                                              ▲    │ failure            │ ended
//!                                              │    ▼                    ▼
//!                                   retry ◀─ RetryPending        next / loop / Finished
//!                                              │ retries exhausted
//!                                              ▼
//!                                          SkipPending ──▶ next sentence or Finished
//! ```
//!
//! The controller is synchronous and performs no I/O. Synthesis requests and
//! timers leave as [`Effect`]s through [`PlaybackController::drain_effects`];
//! their results come back through [`PlaybackController::handle_event`].
//!
//! Every play step and every state-changing operation bumps the generation.
//! Results tagged with an older generation are dropped, so a slow fetch for a
//! sentence the user already skipped can never start playing.

use super::events::{ControllerEvent, Effect, TimerKind};
use super::state::{PlaybackSettings, PlaybackSnapshot};
use crate::audio::{decode_pcm16le, AudioGate, PlaybackHandle, UserGesture};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use xunting_common::events::{EventBus, PlayerState, StatusMessage, XuntingEvent};
use xunting_common::Lesson;

pub struct PlaybackController {
    gate: AudioGate,
    settings: PlaybackSettings,
    event_bus: Arc<EventBus>,
    /// Render completions are reported through this channel
    events_tx: mpsc::UnboundedSender<ControllerEvent>,

    lesson: Option<Lesson>,
    cursor: usize,
    playing: bool,
    looping: bool,
    loading: bool,
    status: Option<StatusMessage>,
    retry_count: u32,
    generation: u64,
    state: PlayerState,

    /// The only rendering handle; replaced only after the previous one is stopped
    handle: Option<PlaybackHandle>,
    effects: VecDeque<Effect>,
}

impl PlaybackController {
    pub fn new(
        gate: AudioGate,
        settings: PlaybackSettings,
        event_bus: Arc<EventBus>,
        events_tx: mpsc::UnboundedSender<ControllerEvent>,
    ) -> Self {
        Self {
            gate,
            settings,
            event_bus,
            events_tx,
            lesson: None,
            cursor: 0,
            playing: false,
            looping: false,
            loading: false,
            status: None,
            retry_count: 0,
            generation: 0,
            state: PlayerState::Idle,
            handle: None,
            effects: VecDeque::new(),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn status(&self) -> Option<StatusMessage> {
        self.status
    }

    pub fn lesson(&self) -> Option<&Lesson> {
        self.lesson.as_ref()
    }

    pub fn audio_unlocked(&self) -> bool {
        self.gate.is_unlocked()
    }

    /// Take the effects requested since the last call, oldest first
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.effects.drain(..).collect()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            lesson_id: self.lesson.as_ref().map(|l| l.id.clone()),
            lesson_title: self.lesson.as_ref().map(|l| l.title.clone()),
            cursor: self.cursor,
            total: self.lesson.as_ref().map_or(0, Lesson::len),
            playing: self.playing,
            looping: self.looping,
            loading: self.loading,
            audio_unlocked: self.gate.is_unlocked(),
            status: self.status,
            retry_count: self.retry_count,
            generation: self.generation,
        }
    }

    /// Replace the active lesson and start from its first sentence.
    ///
    /// Playback begins immediately if the output is already unlocked; otherwise
    /// the controller waits in `AwaitingUnlock` for a user gesture.
    pub fn load_lesson(&mut self, lesson: Lesson) -> Result<()> {
        if lesson.is_empty() {
            return Err(Error::InvalidInput(format!(
                "lesson '{}' has no sentences",
                lesson.id
            )));
        }

        self.stop_audio();
        self.bump_generation();
        info!(lesson = %lesson.id, sentences = lesson.len(), "Loading lesson");

        self.lesson = Some(lesson);
        self.cursor = 0;
        self.retry_count = 0;
        self.loading = false;

        if self.gate.is_unlocked() {
            self.playing = true;
            self.play_step();
        } else {
            self.playing = false;
            self.set_status(None);
            self.set_state(PlayerState::AwaitingUnlock);
        }
        Ok(())
    }

    /// Unlock the output on a user gesture and start playing the current sentence.
    ///
    /// On refusal the controller stays in `AwaitingUnlock` with an
    /// `UnlockRequired` status; it never retries on its own.
    pub fn request_unlock_and_play(&mut self, gesture: &UserGesture) -> Result<()> {
        if self.lesson.is_none() {
            return Err(Error::InvalidState("no lesson loaded".to_string()));
        }
        if self.playing && self.state.is_active() {
            debug!("Already playing, ignoring unlock request");
            return Ok(());
        }

        if let Err(e) = self.gate.unlock(gesture) {
            warn!("Audio unlock failed: {}", e);
            self.playing = false;
            self.set_state(PlayerState::AwaitingUnlock);
            self.set_status(Some(StatusMessage::UnlockRequired));
            return Err(e);
        }

        self.start_from_cursor();
        Ok(())
    }

    /// Best-effort unlock without starting playback
    pub fn prime_output(&mut self, gesture: &UserGesture) -> Result<()> {
        self.gate.unlock(gesture)?;
        if self.state == PlayerState::AwaitingUnlock {
            self.set_status(None);
            self.set_state(PlayerState::Paused);
        }
        Ok(())
    }

    /// Stop audio and keep the position
    pub fn pause(&mut self) -> Result<()> {
        if self.lesson.is_none() {
            return Err(Error::InvalidState("no lesson loaded".to_string()));
        }

        self.playing = false;
        self.loading = false;
        self.bump_generation();
        self.stop_audio();

        if self.state.is_active() {
            self.set_status(None);
            self.set_state(PlayerState::Paused);
        }
        Ok(())
    }

    /// Continue with the current sentence. Requires unlocked output.
    pub fn resume(&mut self) -> Result<()> {
        if self.lesson.is_none() {
            return Err(Error::InvalidState("no lesson loaded".to_string()));
        }
        if !self.gate.is_unlocked() {
            self.playing = false;
            self.set_state(PlayerState::AwaitingUnlock);
            self.set_status(Some(StatusMessage::UnlockRequired));
            return Err(Error::AudioLocked(
                "audio output must be unlocked by a user gesture".to_string(),
            ));
        }
        if self.playing && self.state.is_active() {
            return Ok(());
        }

        self.start_from_cursor();
        Ok(())
    }

    /// Jump to sentence `index`, cancelling whatever the current sentence was doing
    pub fn skip_to(&mut self, index: usize) -> Result<()> {
        let len = self
            .lesson
            .as_ref()
            .map(Lesson::len)
            .ok_or_else(|| Error::InvalidState("no lesson loaded".to_string()))?;
        if index >= len {
            return Err(Error::InvalidInput(format!(
                "sentence index {} out of range 0..{}",
                index, len
            )));
        }

        self.stop_audio();
        self.bump_generation();
        self.loading = false;

        if !self.playing && self.state == PlayerState::Finished {
            self.set_status(None);
            if self.gate.is_unlocked() {
                self.set_state(PlayerState::Paused);
            } else {
                self.set_state(PlayerState::AwaitingUnlock);
            }
        }

        self.move_cursor(index);
        Ok(())
    }

    pub fn skip_next(&mut self) -> Result<()> {
        if self.lesson.is_none() {
            return Err(Error::InvalidState("no lesson loaded".to_string()));
        }
        self.skip_to(self.cursor + 1)
    }

    pub fn skip_previous(&mut self) -> Result<()> {
        if self.lesson.is_none() {
            return Err(Error::InvalidState("no lesson loaded".to_string()));
        }
        let previous = self
            .cursor
            .checked_sub(1)
            .ok_or_else(|| Error::InvalidInput("already at the first sentence".to_string()))?;
        self.skip_to(previous)
    }

    /// Takes effect at the next completion; an in-flight fetch is not disturbed
    pub fn set_loop(&mut self, enabled: bool) {
        if self.looping != enabled {
            debug!(enabled, "Loop mode changed");
        }
        self.looping = enabled;
    }

    /// Release the lesson and the output context
    pub fn teardown(&mut self) {
        self.bump_generation();
        self.stop_audio();
        self.gate.teardown();

        self.lesson = None;
        self.cursor = 0;
        self.playing = false;
        self.loading = false;
        self.retry_count = 0;
        self.set_status(None);
        self.set_state(PlayerState::Idle);
        info!("Player torn down");
    }

    /// Apply the outcome of an earlier effect or a render completion
    pub fn handle_event(&mut self, event: ControllerEvent) {
        if event.generation() != self.generation {
            debug!(
                event_generation = event.generation(),
                current = self.generation,
                "Dropping stale controller event"
            );
            return;
        }

        match event {
            ControllerEvent::Synthesized { result, .. } => {
                if self.state != PlayerState::FetchingAudio {
                    return;
                }
                self.loading = false;
                match result {
                    Ok(bytes) if !bytes.is_empty() => self.start_rendering(&bytes),
                    Ok(_) => self.on_failure("synthesis returned no audio"),
                    Err(e) => self.on_failure(&e.to_string()),
                }
            }
            ControllerEvent::TimerFired { kind, .. } => match (kind, self.state) {
                (TimerKind::Retry, PlayerState::RetryPending) => self.play_step(),
                (TimerKind::Skip, PlayerState::SkipPending) => self.advance_or_finish(),
                _ => {}
            },
            ControllerEvent::PlaybackEnded { .. } => {
                if self.state == PlayerState::Playing {
                    self.on_completion();
                }
            }
        }
    }

    /// Begin playing at the cursor; a finished lesson starts over.
    /// The retry count survives a pause so a failing sentence is not granted fresh attempts.
    fn start_from_cursor(&mut self) {
        if self.state == PlayerState::Finished {
            self.cursor = 0;
            self.retry_count = 0;
        }
        self.playing = true;
        self.play_step();
    }

    /// The one place the cursor changes
    fn move_cursor(&mut self, index: usize) {
        self.cursor = index;
        self.retry_count = 0;
        if self.playing {
            self.play_step();
        }
    }

    fn play_step(&mut self) {
        let Some(utterance) = self
            .lesson
            .as_ref()
            .and_then(|l| l.sentence(self.cursor))
            .map(|s| s.utterance())
        else {
            return;
        };

        self.bump_generation();
        self.stop_audio();
        self.loading = true;
        self.set_state(PlayerState::FetchingAudio);
        self.set_status(Some(StatusMessage::ReadingAloud));

        if let Some(lesson) = self.lesson.as_ref() {
            self.event_bus.emit_lossy(XuntingEvent::SentenceStarted {
                lesson_id: lesson.id.clone(),
                index: self.cursor,
                total: lesson.len(),
                timestamp: xunting_common::time::now(),
            });
        }
        debug!(
            index = self.cursor,
            generation = self.generation,
            attempt = self.retry_count + 1,
            "Requesting synthesis"
        );

        self.effects.push_back(Effect::Synthesize {
            generation: self.generation,
            index: self.cursor,
            utterance,
        });
    }

    fn start_rendering(&mut self, bytes: &[u8]) {
        self.stop_audio();

        let buffer = decode_pcm16le(bytes);
        if buffer.is_empty() {
            self.on_failure("audio too short to decode");
            return;
        }

        let tx = self.events_tx.clone();
        let generation = self.generation;
        let on_ended = Box::new(move || {
            let _ = tx.send(ControllerEvent::PlaybackEnded { generation });
        });

        match self.gate.play_buffer(buffer, on_ended) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.retry_count = 0;
                self.set_status(None);
                self.set_state(PlayerState::Playing);
            }
            Err(e) => self.on_failure(&e.to_string()),
        }
    }

    fn on_failure(&mut self, reason: &str) {
        self.loading = false;

        if self.retry_count < self.settings.retry_limit {
            self.retry_count += 1;
            warn!(
                index = self.cursor,
                attempt = self.retry_count,
                "Sentence failed ({}), retrying",
                reason
            );
            self.set_status(Some(StatusMessage::Retrying {
                attempt: self.retry_count,
            }));
            self.set_state(PlayerState::RetryPending);
            self.effects.push_back(Effect::StartTimer {
                generation: self.generation,
                delay: self.settings.retry_delay,
                kind: TimerKind::Retry,
            });
        } else {
            warn!(index = self.cursor, "Sentence failed ({}), skipping", reason);
            self.set_status(Some(StatusMessage::Skipping));
            self.set_state(PlayerState::SkipPending);
            self.effects.push_back(Effect::StartTimer {
                generation: self.generation,
                delay: self.settings.skip_notice,
                kind: TimerKind::Skip,
            });
        }
    }

    fn on_completion(&mut self) {
        self.handle = None;
        self.retry_count = 0;

        if self.looping {
            self.play_step();
        } else {
            self.advance_or_finish();
        }
    }

    /// Move past the current sentence, or finish after the last one
    fn advance_or_finish(&mut self) {
        let len = self.lesson.as_ref().map_or(0, Lesson::len);
        if self.cursor + 1 < len {
            self.move_cursor(self.cursor + 1);
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.bump_generation();
        self.stop_audio();
        self.playing = false;
        self.loading = false;
        self.set_status(Some(StatusMessage::Finished));
        self.set_state(PlayerState::Finished);

        if let Some(lesson) = self.lesson.as_ref() {
            info!(lesson = %lesson.id, "Lesson finished");
            self.event_bus.emit_lossy(XuntingEvent::LessonFinished {
                lesson_id: lesson.id.clone(),
                timestamp: xunting_common::time::now(),
            });
        }
    }

    fn stop_audio(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.gate.stop(&handle);
        }
    }

    fn bump_generation(&mut self) {
        self.generation += 1;
        // Work requested for older generations would only produce stale events
        let current = self.generation;
        self.effects.retain(|e| e.generation() == current);
    }

    fn set_state(&mut self, new_state: PlayerState) {
        if self.state == new_state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;
        debug!(%old_state, %new_state, "Playback state changed");
        self.event_bus.emit_lossy(XuntingEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: xunting_common::time::now(),
        });
    }

    fn set_status(&mut self, status: Option<StatusMessage>) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.event_bus.emit_lossy(XuntingEvent::StatusChanged {
            status,
            timestamp: xunting_common::time::now(),
        });
    }
}
