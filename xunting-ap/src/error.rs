//! Error types for xunting-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

use crate::speech::SpeechError;

/// Main error type for xunting-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Output is still blocked by the platform autoplay policy; needs a fresh user gesture
    #[error("Audio locked: {0}")]
    AudioLocked(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Speech synthesis or lesson generation errors
    #[error("Speech service error: {0}")]
    Speech(#[from] SpeechError),

    /// Errors from the shared crate (store, schedules)
    #[error(transparent)]
    Common(#[from] xunting_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using xunting-ap Error
pub type Result<T> = std::result::Result<T, Error>;
