//! Core audio data types

use std::time::Duration;

/// Sample rate of synthesized speech, in Hz
pub const SAMPLE_RATE: u32 = 24_000;

/// Decoded mono audio ready for rendering.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Single channel
/// - Sample rate is always 24000 Hz for synthesized speech
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms())
    }
}
