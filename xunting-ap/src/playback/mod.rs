//! Sequential lesson playback

pub mod controller;
pub mod engine;
pub mod events;
pub mod state;

pub use controller::PlaybackController;
pub use engine::{EngineHandle, PlaybackEngine};
pub use events::{ControllerEvent, Effect, TimerKind};
pub use state::{PlaybackSettings, PlaybackSnapshot};
