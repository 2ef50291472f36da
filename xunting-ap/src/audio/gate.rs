//! Audio output gate
//!
//! Wraps the platform output context and enforces the autoplay policy: output
//! starts suspended and only an explicit user gesture may start it. Once
//! unlocked, the gate renders one buffer at a time through a cancelable
//! [`PlaybackHandle`].
//!
//! State transitions:
//! - `Locked` → `Unlocking` on [`AudioGate::unlock`]
//! - `Unlocking` → `Unlocked` if the context reports running, else back to `Locked`
//! - any → `Locked` on [`AudioGate::teardown`]

use super::types::{PcmBuffer, SAMPLE_RATE};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Proof that an operation runs in direct response to user interaction.
///
/// Only the interaction layer (CLI input loop, front end click handlers) creates
/// these. Timers and network callbacks never hold one, so they can never unlock
/// the output.
#[derive(Debug, Clone, Copy)]
pub struct UserGesture {
    source: &'static str,
}

impl UserGesture {
    pub fn new(source: &'static str) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }
}

/// Gate readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Unlocking,
    Unlocked,
}

/// Platform output context state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Opens output contexts on a platform audio API
pub trait OutputBackend: Send + Sync {
    /// Open a context rendering mono audio at `sample_rate`. Contexts start suspended.
    fn open(&self, sample_rate: u32) -> Result<Box<dyn OutputContext>>;
}

/// A live platform output context
pub trait OutputContext: Send {
    fn state(&self) -> ContextState;

    /// Ask the platform to start the suspended context. Returns once the request
    /// has been answered; callers check [`OutputContext::state`] afterwards.
    fn resume(&mut self) -> Result<()>;

    /// Begin rendering `buffer`. The context calls [`PlaybackHandle::complete`]
    /// when the last sample has been rendered.
    fn start(&mut self, buffer: PcmBuffer, handle: PlaybackHandle) -> Result<()>;

    /// Stop rendering the buffer started with handle `handle_id`, if it is still active.
    fn stop(&mut self, handle_id: u64);

    fn close(&mut self);
}

type EndedCallback = Box<dyn FnOnce() + Send>;

struct HandleInner {
    on_ended: Mutex<Option<EndedCallback>>,
    finished: AtomicBool,
    stopped: AtomicBool,
}

/// Cancelable handle to one rendering buffer.
///
/// The completion callback fires at most once, and never after the handle was
/// stopped.
#[derive(Clone)]
pub struct PlaybackHandle {
    id: u64,
    inner: Arc<HandleInner>,
}

impl PlaybackHandle {
    pub(crate) fn new(id: u64, on_ended: EndedCallback) -> Self {
        Self {
            id,
            inner: Arc::new(HandleInner {
                on_ended: Mutex::new(Some(on_ended)),
                finished: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Still rendering: neither finished naturally nor stopped
    pub fn is_active(&self) -> bool {
        !self.inner.finished.load(Ordering::SeqCst) && !self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Mark natural end of rendering and fire the completion callback.
    ///
    /// Called by output contexts from their render thread.
    pub fn complete(&self) {
        if self.inner.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        let callback = self.take_callback();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Drop the completion callback and mark the handle stopped
    fn detach(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        drop(self.take_callback());
    }

    fn take_callback(&self) -> Option<EndedCallback> {
        self.inner
            .on_ended
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Gate over the platform output context
pub struct AudioGate {
    backend: Arc<dyn OutputBackend>,
    context: Option<Box<dyn OutputContext>>,
    state: GateState,
    current: Option<PlaybackHandle>,
    next_handle_id: u64,
}

impl AudioGate {
    pub fn new(backend: Arc<dyn OutputBackend>) -> Self {
        Self {
            backend,
            context: None,
            state: GateState::Locked,
            current: None,
            next_handle_id: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Unlocked and the context is actually running
    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
            && self
                .context
                .as_ref()
                .is_some_and(|ctx| ctx.state() == ContextState::Running)
    }

    /// Unlock the output in response to a user gesture.
    ///
    /// Opens the context on first use and resumes it if suspended. Succeeds only
    /// if the context then reports running; on failure the gate is `Locked` again
    /// and the caller must ask the user for another gesture.
    pub fn unlock(&mut self, gesture: &UserGesture) -> Result<()> {
        if self.is_unlocked() {
            return Ok(());
        }

        debug!(source = gesture.source(), "Unlocking audio output");
        self.state = GateState::Unlocking;

        if self
            .context
            .as_ref()
            .is_some_and(|ctx| ctx.state() == ContextState::Closed)
        {
            self.context = None;
        }

        if self.context.is_none() {
            match self.backend.open(SAMPLE_RATE) {
                Ok(ctx) => self.context = Some(ctx),
                Err(e) => {
                    self.state = GateState::Locked;
                    warn!("Failed to open audio output: {}", e);
                    return Err(e);
                }
            }
        }

        let Some(ctx) = self.context.as_mut() else {
            self.state = GateState::Locked;
            return Err(Error::Internal("output context missing after open".to_string()));
        };

        if ctx.state() == ContextState::Suspended {
            if let Err(e) = ctx.resume() {
                self.state = GateState::Locked;
                warn!("Audio output resume refused: {}", e);
                return Err(Error::AudioLocked(format!("resume refused: {}", e)));
            }
        }

        if ctx.state() == ContextState::Running {
            self.state = GateState::Unlocked;
            info!(source = gesture.source(), "Audio output unlocked");
            Ok(())
        } else {
            self.state = GateState::Locked;
            Err(Error::AudioLocked(
                "output context did not start; another user gesture is required".to_string(),
            ))
        }
    }

    /// Render `buffer`; `on_ended` fires once when it finishes naturally.
    pub fn play_buffer(
        &mut self,
        buffer: PcmBuffer,
        on_ended: Box<dyn FnOnce() + Send>,
    ) -> Result<PlaybackHandle> {
        if !self.is_unlocked() {
            return Err(Error::AudioLocked("audio output is not unlocked".to_string()));
        }
        if let Some(previous) = self.current.as_ref().filter(|h| h.is_active()) {
            return Err(Error::InvalidState(format!(
                "handle {} is still rendering",
                previous.id()
            )));
        }
        let Some(ctx) = self.context.as_mut() else {
            return Err(Error::AudioLocked("no output context".to_string()));
        };

        self.next_handle_id += 1;
        let handle = PlaybackHandle::new(self.next_handle_id, on_ended);
        debug!(
            handle = handle.id(),
            duration_ms = buffer.duration_ms(),
            "Starting buffer"
        );
        ctx.start(buffer, handle.clone())?;
        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Stop a handle. Idempotent; the completion callback is detached first so
    /// a stopped handle never reports completion.
    pub fn stop(&mut self, handle: &PlaybackHandle) {
        handle.detach();
        if let Some(ctx) = self.context.as_mut() {
            ctx.stop(handle.id());
        }
        if self.current.as_ref().is_some_and(|h| h.id() == handle.id()) {
            self.current = None;
        }
    }

    /// Close the output context. The gate is `Locked` afterwards.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.current.take() {
            self.stop(&handle);
        }
        if let Some(mut ctx) = self.context.take() {
            ctx.close();
            debug!("Audio output context closed");
        }
        self.state = GateState::Locked;
    }
}

impl Drop for AudioGate {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Probe {
        allow_resume: AtomicBool,
        opened: AtomicUsize,
        started: Mutex<Vec<PlaybackHandle>>,
        stopped: Mutex<Vec<u64>>,
    }

    struct ProbeBackend(Arc<Probe>);

    struct ProbeContext {
        probe: Arc<Probe>,
        state: ContextState,
    }

    impl OutputBackend for ProbeBackend {
        fn open(&self, sample_rate: u32) -> Result<Box<dyn OutputContext>> {
            assert_eq!(sample_rate, SAMPLE_RATE);
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ProbeContext {
                probe: self.0.clone(),
                state: ContextState::Suspended,
            }))
        }
    }

    impl OutputContext for ProbeContext {
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
            self.probe.started.lock().unwrap().push(handle);
            Ok(())
        }

        fn stop(&mut self, handle_id: u64) {
            self.probe.stopped.lock().unwrap().push(handle_id);
        }

        fn close(&mut self) {
            self.state = ContextState::Closed;
        }
    }

    fn gate(allow_resume: bool) -> (AudioGate, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        probe.allow_resume.store(allow_resume, Ordering::SeqCst);
        (AudioGate::new(Arc::new(ProbeBackend(probe.clone()))), probe)
    }

    fn tone() -> PcmBuffer {
        PcmBuffer::new(vec![0.1; 240], SAMPLE_RATE)
    }

    #[test]
    fn test_unlock_success_opens_lazily() {
        let (mut gate, probe) = gate(true);
        assert_eq!(gate.state(), GateState::Locked);
        assert_eq!(probe.opened.load(Ordering::SeqCst), 0);

        gate.unlock(&UserGesture::new("test")).unwrap();
        assert_eq!(gate.state(), GateState::Unlocked);
        assert!(gate.is_unlocked());

        // Second unlock is a no-op and does not reopen
        gate.unlock(&UserGesture::new("test")).unwrap();
        assert_eq!(probe.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unlock_refused_returns_to_locked() {
        let (mut gate, probe) = gate(false);
        let err = gate.unlock(&UserGesture::new("test")).unwrap_err();
        assert!(matches!(err, Error::AudioLocked(_)));
        assert_eq!(gate.state(), GateState::Locked);

        // A later gesture can still succeed on the same context
        probe.allow_resume.store(true, Ordering::SeqCst);
        gate.unlock(&UserGesture::new("test")).unwrap();
        assert!(gate.is_unlocked());
        assert_eq!(probe.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_play_requires_unlock() {
        let (mut gate, _probe) = gate(true);
        let result = gate.play_buffer(tone(), Box::new(|| {}));
        assert!(matches!(result, Err(Error::AudioLocked(_))));
    }

    #[test]
    fn test_completion_fires_once() {
        let (mut gate, _probe) = gate(true);
        gate.unlock(&UserGesture::new("test")).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = gate
            .play_buffer(tone(), Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        handle.complete();
        handle.complete();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
        assert!(!handle.is_active());
    }

    #[test]
    fn test_stopped_handle_never_fires() {
        let (mut gate, probe) = gate(true);
        gate.unlock(&UserGesture::new("test")).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = gate
            .play_buffer(tone(), Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        gate.stop(&handle);
        gate.stop(&handle);
        handle.complete();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(handle.is_stopped());
        assert_eq!(*probe.stopped.lock().unwrap(), vec![handle.id(), handle.id()]);
    }

    #[test]
    fn test_overlapping_play_rejected() {
        let (mut gate, _probe) = gate(true);
        gate.unlock(&UserGesture::new("test")).unwrap();

        let first = gate.play_buffer(tone(), Box::new(|| {})).unwrap();
        let overlap = gate.play_buffer(tone(), Box::new(|| {}));
        assert!(matches!(overlap, Err(Error::InvalidState(_))));

        gate.stop(&first);
        let second = gate.play_buffer(tone(), Box::new(|| {})).unwrap();
        assert_ne!(first.id(), second.id());

        second.complete();
        assert!(gate.play_buffer(tone(), Box::new(|| {})).is_ok());
    }

    #[test]
    fn test_teardown_locks_and_reopens_on_next_unlock() {
        let (mut gate, probe) = gate(true);
        gate.unlock(&UserGesture::new("test")).unwrap();
        let handle = gate.play_buffer(tone(), Box::new(|| {})).unwrap();

        gate.teardown();
        assert_eq!(gate.state(), GateState::Locked);
        assert!(handle.is_stopped());
        assert!(!gate.is_unlocked());

        gate.unlock(&UserGesture::new("test")).unwrap();
        assert_eq!(probe.opened.load(Ordering::SeqCst), 2);
    }
}
