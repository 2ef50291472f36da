//! Output backend for tests
//!
//! Nothing is rendered. Started handles are recorded so the test decides when
//! a buffer ends, or every buffer can be completed as soon as it starts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use xunting_ap::audio::{ContextState, OutputBackend, OutputContext, PcmBuffer, PlaybackHandle};
use xunting_ap::Result;

/// Shared view into every context the backend opened
pub struct OutputProbe {
    /// Whether resume() actually starts the context
    pub allow_resume: AtomicBool,
    /// Complete each buffer as soon as it starts
    pub auto_complete: AtomicBool,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    started: Mutex<Vec<PlaybackHandle>>,
    stopped: Mutex<Vec<u64>>,
}

impl Default for OutputProbe {
    fn default() -> Self {
        Self {
            allow_resume: AtomicBool::new(true),
            auto_complete: AtomicBool::new(false),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
        }
    }
}

impl OutputProbe {
    pub fn started_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn last_started(&self) -> Option<PlaybackHandle> {
        self.started.lock().unwrap().last().cloned()
    }

    pub fn stopped_ids(&self) -> Vec<u64> {
        self.stopped.lock().unwrap().clone()
    }

    /// Complete the buffer that is still rendering. Returns false if none is.
    pub fn finish_current(&self) -> bool {
        let handle = self
            .started
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|h| h.is_active())
            .cloned();
        match handle {
            Some(handle) => {
                handle.complete();
                true
            }
            None => false,
        }
    }
}

pub struct FakeOutput(pub Arc<OutputProbe>);

impl FakeOutput {
    pub fn new() -> (Self, Arc<OutputProbe>) {
        let probe = Arc::new(OutputProbe::default());
        (Self(Arc::clone(&probe)), probe)
    }
}

struct FakeContext {
    probe: Arc<OutputProbe>,
    state: ContextState,
}

impl OutputBackend for FakeOutput {
    fn open(&self, _sample_rate: u32) -> Result<Box<dyn OutputContext>> {
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            probe: Arc::clone(&self.0),
            state: ContextState::Suspended,
        }))
    }
}

impl OutputContext for FakeContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        if self.probe.allow_resume.load(Ordering::SeqCst) {
            self.state = ContextState::Running;
        }
        Ok(())
    }

    fn start(&mut self, _buffer: PcmBuffer, handle: PlaybackHandle) -> Result<()> {
        self.probe.started.lock().unwrap().push(handle.clone());
        if self.probe.auto_complete.load(Ordering::SeqCst) {
            handle.complete();
        }
        Ok(())
    }

    fn stop(&mut self, handle_id: u64) {
        self.probe.stopped.lock().unwrap().push(handle_id);
    }

    fn close(&mut self) {
        self.state = ContextState::Closed;
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
    }
}
