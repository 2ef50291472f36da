//! Controller inputs and outputs
//!
//! The controller never performs I/O. It asks for work through [`Effect`]s and
//! receives the outcome as [`ControllerEvent`]s. Both carry the generation they
//! were issued for; the controller ignores events whose generation is no longer
//! current.

use crate::speech::SpeechError;
use std::time::Duration;

/// Why a timer was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Cooldown before retrying synthesis of the current sentence
    Retry,
    /// Skip notice before moving past a sentence that kept failing
    Skip,
}

/// Work requested by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Synthesize speech for sentence `index`
    Synthesize {
        generation: u64,
        index: usize,
        utterance: String,
    },

    /// Report [`ControllerEvent::TimerFired`] after `delay`
    StartTimer {
        generation: u64,
        delay: Duration,
        kind: TimerKind,
    },
}

impl Effect {
    pub fn generation(&self) -> u64 {
        match self {
            Effect::Synthesize { generation, .. } | Effect::StartTimer { generation, .. } => {
                *generation
            }
        }
    }
}

/// Outcomes delivered back to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// A synthesis request finished
    Synthesized {
        generation: u64,
        result: Result<Vec<u8>, SpeechError>,
    },

    /// A timer started by [`Effect::StartTimer`] expired
    TimerFired { generation: u64, kind: TimerKind },

    /// The rendering buffer reached its natural end
    PlaybackEnded { generation: u64 },
}

impl ControllerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ControllerEvent::Synthesized { generation, .. }
            | ControllerEvent::TimerFired { generation, .. }
            | ControllerEvent::PlaybackEnded { generation } => *generation,
        }
    }
}
