//! Xunting reader (xunting-ap) - Main entry point
//!
//! Interactive console front end: reads one command per line from stdin and
//! prints player events as they are broadcast.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xunting_ap::app::App;
use xunting_ap::audio::{AudioGate, CpalBackend, UserGesture};
use xunting_ap::cli::{CliCommand, HELP};
use xunting_ap::config::TomlConfig;
use xunting_ap::content::LessonSource;
use xunting_ap::gemini::GeminiClient;
use xunting_ap::playback::{PlaybackEngine, PlaybackSettings};
use xunting_ap::schedule::{LocalClock, ScheduleMatcher};
use xunting_ap::speech::SpeechClient;
use xunting_ap::SharedState;
use xunting_common::config::{default_state_file, resolve_config_path, CONFIG_ENV_VAR};
use xunting_common::events::{EventBus, XuntingEvent};
use xunting_common::store::{JsonFileStore, StateStore};

/// Command-line arguments for xunting-ap
#[derive(Parser, Debug)]
#[command(name = "xunting-ap")]
#[command(about = "Reads lessons aloud sentence by sentence, on demand or on a schedule")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "XUNTING_CONFIG")]
    config: Option<PathBuf>,

    /// Persisted state file
    #[arg(short, long, env = "XUNTING_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Output device name
    #[arg(short, long)]
    device: Option<String>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config =
        TomlConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("xunting_ap={0},xunting_common={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting Xunting reader v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    if args.list_devices {
        for name in CpalBackend::list_devices().context("Failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    if args.api_key.is_some() {
        config.speech.api_key = args.api_key.clone();
    }

    // Persisted state
    let state_file = args
        .state_file
        .clone()
        .or_else(|| config.state_file.clone())
        .unwrap_or_else(default_state_file);
    info!("State file: {}", state_file.display());
    let store = Arc::new(JsonFileStore::new(state_file));
    let persisted = match store.load() {
        Ok(Some(persisted)) => persisted,
        Ok(None) => Default::default(),
        Err(e) => {
            warn!("Failed to read saved state, using defaults: {}", e);
            Default::default()
        }
    };

    let event_bus = Arc::new(EventBus::default());
    let state = Arc::new(SharedState::new(persisted, Arc::clone(&event_bus)));

    // Playback engine
    let gemini = Arc::new(
        GeminiClient::new(&config.speech).context("Failed to create speech client")?,
    );
    let backend = Arc::new(CpalBackend::new(
        args.device.clone().or_else(|| config.audio_device.clone()),
    ));
    let engine = PlaybackEngine::spawn(
        AudioGate::new(backend),
        Arc::clone(&gemini) as Arc<dyn SpeechClient>,
        PlaybackSettings::from(&config.playback),
        Arc::clone(&event_bus),
    );
    info!("Playback engine initialized");

    // Schedule matcher and activation loop
    let (activation_tx, activation_rx) = mpsc::channel(8);
    let matcher = ScheduleMatcher::new(
        Arc::clone(&state),
        Arc::new(LocalClock),
        config.scheduler.poll_interval(),
        activation_tx,
    );
    let app = Arc::new(App::new(
        Arc::clone(&state),
        engine.clone(),
        store,
        Some(gemini as Arc<dyn LessonSource>),
        matcher,
    ));
    tokio::spawn(Arc::clone(&app).run_activations(activation_rx));
    tokio::spawn(print_events(state.subscribe_events()));

    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match CliCommand::parse(&line) {
                    Ok(Some(CliCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(e) = execute(&app, command).await {
                            println!("! {}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("! {}", e),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    engine.shutdown().await.context("Failed to stop playback engine")?;
    info!("Shutdown complete");
    Ok(())
}

/// Run one console command. Every command is a user gesture.
async fn execute(app: &App, command: CliCommand) -> xunting_ap::Result<()> {
    let gesture = UserGesture::new("console");
    let engine = app.engine();

    match command {
        CliCommand::Play => app.play(gesture).await?,
        CliCommand::Pause => engine.pause().await?,
        CliCommand::Resume => engine.resume().await?,
        CliCommand::Next => engine.skip_next().await?,
        CliCommand::Previous => engine.skip_previous().await?,
        CliCommand::Goto(index) => engine.skip_to(index).await?,
        CliCommand::Loop(enabled) => engine.set_loop(enabled).await?,
        CliCommand::Lesson(id) => app.select_catalog_lesson(&id).await?,
        CliCommand::Lessons => {
            for lesson in app.catalog().all() {
                println!(
                    "  {:<4} [{}] {} ({} sentences)",
                    lesson.id,
                    lesson.category,
                    lesson.title,
                    lesson.len()
                );
            }
        }
        CliCommand::Fetch(name) => {
            println!("Generating lesson '{}'...", name);
            app.fetch_and_select(&name).await?;
        }
        CliCommand::Arm => app.set_auto_mode(true, gesture).await?,
        CliCommand::Disarm => app.set_auto_mode(false, gesture).await?,
        CliCommand::Schedules => {
            let armed = app.state().is_auto_mode().await;
            println!("auto mode: {}", if armed { "armed" } else { "off" });
            for s in app.schedules().await {
                println!(
                    "  {:<6} {} {}-{} days {:?}{}",
                    s.id,
                    s.name,
                    s.start_time,
                    s.end_time,
                    s.repeat_days,
                    if s.enabled { "" } else { " (disabled)" }
                );
            }
        }
        CliCommand::Toggle(id) => app.toggle_schedule(&id).await?,
        CliCommand::Day(id, day) => app.toggle_schedule_day(&id, day).await?,
        CliCommand::Time(id, start, end) => app.set_schedule_times(&id, start, end).await?,
        CliCommand::Add {
            name,
            start,
            end,
            days,
        } => {
            let id = app.add_schedule(&name, start, end, days).await?;
            println!("added schedule {}", id);
        }
        CliCommand::Remove(id) => app.remove_schedule(&id).await?,
        CliCommand::Status => {
            let snapshot = app.snapshot().await?;
            println!(
                "{} | {} | sentence {} | loop {} | audio {}{}",
                snapshot.state,
                snapshot.lesson_title.as_deref().unwrap_or("-"),
                snapshot.progress(),
                if snapshot.looping { "on" } else { "off" },
                if snapshot.audio_unlocked { "unlocked" } else { "locked" },
                snapshot
                    .status
                    .map(|s| format!(" | {}", s))
                    .unwrap_or_default()
            );
        }
        CliCommand::Back => app.leave_player().await?,
        CliCommand::Help => println!("{}", HELP),
        CliCommand::Quit => {}
    }
    Ok(())
}

/// Print broadcast events for the console user
async fn print_events(mut rx: broadcast::Receiver<XuntingEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event {
                XuntingEvent::SentenceStarted { index, total, .. } => {
                    println!("> sentence {}/{}", index + 1, total)
                }
                XuntingEvent::StatusChanged {
                    status: Some(status),
                    ..
                } => println!("> {}", status),
                XuntingEvent::PlaybackStateChanged { new_state, .. } => {
                    println!("> [{}]", new_state)
                }
                XuntingEvent::ViewChanged { view, .. } => println!("> view: {}", view),
                XuntingEvent::AutoModeChanged { armed, .. } => {
                    println!("> auto mode {}", if armed { "armed" } else { "off" })
                }
                XuntingEvent::ScheduleTriggered { schedule_name, .. } => {
                    println!("> schedule '{}' started", schedule_name)
                }
                XuntingEvent::LessonFinished { .. } | XuntingEvent::StatusChanged { .. } => {}
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event printer lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
