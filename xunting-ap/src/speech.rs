//! Speech synthesis client interface

use async_trait::async_trait;
use thiserror::Error;

/// Speech and lesson-generation service errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    #[error("Text to synthesize is empty")]
    EmptyText,

    #[error("No API key configured")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("No audio in response")]
    NoAudio,

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Turns text into mono signed 16-bit little-endian PCM at 24 kHz
#[async_trait]
pub trait SpeechClient: Send + Sync {
    /// Synthesize `utterance`. Success always carries at least one byte; a
    /// response without audio is reported as [`SpeechError::NoAudio`].
    async fn synthesize(&self, utterance: &str) -> Result<Vec<u8>, SpeechError>;
}
