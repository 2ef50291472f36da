//! Speech client replaying scripted results

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use xunting_ap::speech::{SpeechClient, SpeechError};

/// Little-endian PCM16 bytes for `samples` quiet samples
pub fn pcm_bytes(samples: usize) -> Vec<u8> {
    std::iter::repeat([0x00, 0x10]).take(samples).flatten().collect()
}

/// Answers from the script first, then with the fallback result forever
pub struct ScriptedSpeech {
    script: Mutex<VecDeque<Result<Vec<u8>, SpeechError>>>,
    fallback: Result<Vec<u8>, SpeechError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSpeech {
    /// Every request succeeds
    pub fn succeeding() -> Self {
        Self::with_fallback(Ok(pcm_bytes(240)))
    }

    /// Every request fails with a network error
    pub fn failing() -> Self {
        Self::with_fallback(Err(SpeechError::Network("connection refused".to_string())))
    }

    pub fn with_fallback(fallback: Result<Vec<u8>, SpeechError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, result: Result<Vec<u8>, SpeechError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    /// Answer every request after `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Utterances requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechClient for ScriptedSpeech {
    async fn synthesize(&self, utterance: &str) -> Result<Vec<u8>, SpeechError> {
        self.calls.lock().unwrap().push(utterance.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}
