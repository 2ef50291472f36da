//! # Xunting Audio Player Library (xunting-ap)
//!
//! Reads a lesson aloud sentence by sentence: each sentence's original text and
//! translation are synthesized remotely, decoded from raw PCM and rendered through
//! an output gate that honors the platform autoplay policy. A schedule matcher
//! can force the player open at configured times of day.

pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod gemini;
pub mod playback;
pub mod schedule;
pub mod speech;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
