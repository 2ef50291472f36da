//! Playback engine
//!
//! A single tokio task owns the [`PlaybackController`] and serializes everything
//! that touches it: commands from [`EngineHandle`]s and controller events from
//! synthesis, timer and render completion. Effects the controller requests are
//! executed as spawned tasks; tasks belonging to an older generation are
//! aborted as soon as the generation moves on.

use super::controller::PlaybackController;
use super::events::{ControllerEvent, Effect};
use super::state::{PlaybackSettings, PlaybackSnapshot};
use crate::audio::{AudioGate, UserGesture};
use crate::error::{Error, Result};
use crate::speech::SpeechClient;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use xunting_common::events::EventBus;
use xunting_common::Lesson;

/// Queued commands per engine
const COMMAND_QUEUE_CAPACITY: usize = 64;

type Job = Box<dyn FnOnce(&mut PlaybackController) + Send>;

enum Command {
    Run(Job),
    Shutdown(oneshot::Sender<()>),
}

/// Playback engine - owns the controller and runs its effects
pub struct PlaybackEngine {
    controller: PlaybackController,
    speech: Arc<dyn SpeechClient>,
    commands: mpsc::Receiver<Command>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    /// Spawned fetch and timer tasks with the generation they serve
    tasks: Vec<(u64, JoinHandle<()>)>,
}

impl PlaybackEngine {
    /// Create an engine and the handle used to control it
    pub fn new(
        gate: AudioGate,
        speech: Arc<dyn SpeechClient>,
        settings: PlaybackSettings,
        event_bus: Arc<EventBus>,
    ) -> (Self, EngineHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let controller = PlaybackController::new(gate, settings, event_bus, events_tx.clone());

        let engine = Self {
            controller,
            speech,
            commands,
            events_rx,
            events_tx,
            tasks: Vec::new(),
        };
        (engine, EngineHandle { commands: commands_tx })
    }

    /// Create an engine and run it on the current tokio runtime
    pub fn spawn(
        gate: AudioGate,
        speech: Arc<dyn SpeechClient>,
        settings: PlaybackSettings,
        event_bus: Arc<EventBus>,
    ) -> EngineHandle {
        let (engine, handle) = Self::new(gate, speech, settings, event_bus);
        tokio::spawn(engine.run());
        handle
    }

    /// Serve commands and controller events until shut down or every handle is dropped
    pub async fn run(mut self) {
        info!("Playback engine started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Run(job)) => job(&mut self.controller),
                    Some(Command::Shutdown(reply)) => {
                        self.shutdown();
                        let _ = reply.send(());
                        return;
                    }
                    None => break,
                },
                Some(event) = self.events_rx.recv() => {
                    self.controller.handle_event(event);
                }
            }
            self.run_effects();
        }

        self.shutdown();
    }

    fn run_effects(&mut self) {
        let generation = self.controller.generation();
        self.tasks.retain(|(task_generation, task)| {
            if *task_generation != generation {
                task.abort();
                false
            } else {
                !task.is_finished()
            }
        });

        for effect in self.controller.drain_effects() {
            let task = match effect {
                Effect::Synthesize {
                    generation,
                    index,
                    utterance,
                } => {
                    let speech = Arc::clone(&self.speech);
                    let tx = self.events_tx.clone();
                    debug!(generation, index, "Spawning synthesis");
                    (
                        generation,
                        tokio::spawn(async move {
                            let result = speech.synthesize(&utterance).await;
                            let _ = tx.send(ControllerEvent::Synthesized { generation, result });
                        }),
                    )
                }
                Effect::StartTimer {
                    generation,
                    delay,
                    kind,
                } => {
                    let tx = self.events_tx.clone();
                    debug!(generation, ?kind, ?delay, "Starting timer");
                    (
                        generation,
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = tx.send(ControllerEvent::TimerFired { generation, kind });
                        }),
                    )
                }
            };
            self.tasks.push(task);
        }
    }

    fn shutdown(&mut self) {
        for (_, task) in self.tasks.drain(..) {
            task.abort();
        }
        self.controller.teardown();
        info!("Playback engine stopped");
    }
}

/// Cloneable handle for controlling a running engine
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Run `f` against the controller on the engine task and return its result
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut PlaybackController) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |controller| {
            let _ = tx.send(f(controller));
        });
        self.commands
            .send(Command::Run(job))
            .await
            .map_err(|_| Error::Internal("playback engine is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("playback engine dropped the request".to_string()))
    }

    pub async fn load_lesson(&self, lesson: Lesson) -> Result<()> {
        self.call(move |c| c.load_lesson(lesson)).await?
    }

    pub async fn request_unlock_and_play(&self, gesture: UserGesture) -> Result<()> {
        self.call(move |c| c.request_unlock_and_play(&gesture)).await?
    }

    pub async fn prime_output(&self, gesture: UserGesture) -> Result<()> {
        self.call(move |c| c.prime_output(&gesture)).await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.call(|c| c.pause()).await?
    }

    pub async fn resume(&self) -> Result<()> {
        self.call(|c| c.resume()).await?
    }

    pub async fn skip_to(&self, index: usize) -> Result<()> {
        self.call(move |c| c.skip_to(index)).await?
    }

    pub async fn skip_next(&self) -> Result<()> {
        self.call(|c| c.skip_next()).await?
    }

    pub async fn skip_previous(&self) -> Result<()> {
        self.call(|c| c.skip_previous()).await?
    }

    pub async fn set_loop(&self, enabled: bool) -> Result<()> {
        self.call(move |c| c.set_loop(enabled)).await
    }

    pub async fn teardown(&self) -> Result<()> {
        self.call(|c| c.teardown()).await
    }

    pub async fn snapshot(&self) -> Result<PlaybackSnapshot> {
        self.call(|c| c.snapshot()).await
    }

    /// Tear the controller down and stop the engine task
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(tx))
            .await
            .map_err(|_| Error::Internal("playback engine is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("playback engine stopped before replying".to_string()))
    }
}
