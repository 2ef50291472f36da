//! Audio output using cpal
//!
//! A cpal `Stream` is not `Send`, so each output context owns a dedicated audio
//! thread that builds the stream and keeps it alive. The stream is built paused,
//! which models the platform's suspended context: nothing is heard until the
//! gate resumes it on a user gesture.
//!
//! Speech is mono at 24 kHz. When the device runs at a different rate the
//! renderer steps through the source at `source_rate / device_rate` samples per
//! frame, and every device channel receives the same sample.

use super::gate::{ContextState, OutputBackend, OutputContext, PlaybackHandle};
use super::types::PcmBuffer;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

const STATE_SUSPENDED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Output backend on the default cpal host
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    /// Output device name (None = default device)
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }
}

impl OutputBackend for CpalBackend {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn OutputContext>> {
        let active: Arc<Mutex<Option<ActiveSource>>> = Arc::new(Mutex::new(None));
        let state = Arc::new(AtomicU8::new(STATE_SUSPENDED));
        let error_flag = Arc::new(AtomicBool::new(false));

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = {
            let device_name = self.device_name.clone();
            let active = Arc::clone(&active);
            let state = Arc::clone(&state);
            let error_flag = Arc::clone(&error_flag);
            std::thread::Builder::new()
                .name("xunting-audio".to_string())
                .spawn(move || {
                    audio_thread(
                        device_name,
                        sample_rate,
                        active,
                        state,
                        error_flag,
                        cmd_rx,
                        ready_tx,
                    )
                })
                .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?
        };

        let device_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(message)) => {
                let _ = thread.join();
                return Err(Error::AudioOutput(message));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(Error::AudioOutput(
                    "audio thread exited during startup".to_string(),
                ));
            }
        };

        Ok(Box::new(CpalContext {
            cmd_tx,
            thread: Some(thread),
            active,
            state,
            error_flag,
            device_rate,
        }))
    }
}

enum AudioCommand {
    Resume(mpsc::Sender<std::result::Result<(), String>>),
    Close,
}

/// Buffer currently being rendered
struct ActiveSource {
    samples: Vec<f32>,
    position: f64,
    step: f64,
    handle: PlaybackHandle,
}

impl ActiveSource {
    fn next_sample(&mut self) -> Option<f32> {
        let index = self.position as usize;
        let sample = *self.samples.get(index)?;
        self.position += self.step;
        Some(sample)
    }
}

struct CpalContext {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<JoinHandle<()>>,
    active: Arc<Mutex<Option<ActiveSource>>>,
    state: Arc<AtomicU8>,
    /// Stream error flag - set by the cpal error callback
    error_flag: Arc<AtomicBool>,
    device_rate: u32,
}

impl CpalContext {
    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveSource>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OutputContext for CpalContext {
    fn state(&self) -> ContextState {
        match self.state.load(Ordering::SeqCst) {
            STATE_CLOSED => ContextState::Closed,
            // A stream error stops the device; report suspended so the next
            // unlock asks for a resume
            STATE_RUNNING if !self.error_flag.load(Ordering::SeqCst) => ContextState::Running,
            _ => ContextState::Suspended,
        }
    }

    fn resume(&mut self) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(AudioCommand::Resume(reply_tx))
            .map_err(|_| Error::AudioOutput("audio thread is not running".to_string()))?;

        match reply_rx.recv() {
            Ok(Ok(())) => {
                self.error_flag.store(false, Ordering::SeqCst);
                Ok(())
            }
            Ok(Err(message)) => Err(Error::AudioOutput(message)),
            Err(_) => Err(Error::AudioOutput("audio thread exited".to_string())),
        }
    }

    fn start(&mut self, buffer: PcmBuffer, handle: PlaybackHandle) -> Result<()> {
        if self.device_rate == 0 || buffer.sample_rate == 0 {
            return Err(Error::AudioOutput("invalid sample rate".to_string()));
        }
        let step = buffer.sample_rate as f64 / self.device_rate as f64;
        *self.lock_active() = Some(ActiveSource {
            samples: buffer.samples,
            position: 0.0,
            step,
            handle,
        });
        Ok(())
    }

    fn stop(&mut self, handle_id: u64) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|s| s.handle.id() == handle_id) {
            *active = None;
        }
    }

    fn close(&mut self) {
        *self.lock_active() = None;
        let _ = self.cmd_tx.send(AudioCommand::Close);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Audio thread panicked");
            }
        }
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.close();
        }
    }
}

/// Body of the audio thread: open the device, build a paused stream, then
/// serve commands until closed.
fn audio_thread(
    device_name: Option<String>,
    sample_rate: u32,
    active: Arc<Mutex<Option<ActiveSource>>>,
    state: Arc<AtomicU8>,
    error_flag: Arc<AtomicBool>,
    commands: mpsc::Receiver<AudioCommand>,
    ready: mpsc::Sender<std::result::Result<u32, String>>,
) {
    let stream = match open_stream(device_name.as_deref(), sample_rate, active, error_flag) {
        Ok((stream, device_rate)) => {
            let _ = ready.send(Ok(device_rate));
            stream
        }
        Err(message) => {
            let _ = ready.send(Err(message));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            AudioCommand::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| format!("Failed to start stream: {}", e));
                if result.is_ok() {
                    state.store(STATE_RUNNING, Ordering::SeqCst);
                    info!("Audio stream started");
                }
                let _ = reply.send(result);
            }
            AudioCommand::Close => break,
        }
    }

    if let Err(e) = stream.pause() {
        debug!("Failed to pause stream on close: {}", e);
    }
    state.store(STATE_CLOSED, Ordering::SeqCst);
    debug!("Audio thread exiting");
}

fn open_stream(
    device_name: Option<&str>,
    sample_rate: u32,
    active: Arc<Mutex<Option<ActiveSource>>>,
    error_flag: Arc<AtomicBool>,
) -> std::result::Result<(Stream, u32), String> {
    let device = select_device(device_name)?;
    let (config, sample_format) = best_config(&device, sample_rate)?;
    let device_rate = config.sample_rate.0;

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        device_rate, config.channels, sample_format
    );
    if device_rate != sample_rate {
        info!(
            "Device does not support {} Hz, rendering at {} Hz",
            sample_rate, device_rate
        );
    }

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, active, error_flag)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, active, error_flag)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, active, error_flag)?,
        other => return Err(format!("Unsupported sample format: {:?}", other)),
    };

    // Some hosts start streams on build; the context must begin suspended
    if let Err(e) = stream.pause() {
        warn!("Failed to pause new stream: {}", e);
    }

    Ok((stream, device_rate))
}

fn select_device(device_name: Option<&str>) -> std::result::Result<Device, String> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let found = host
            .output_devices()
            .map_err(|e| format!("Failed to enumerate devices: {}", e))?
            .find(|d| d.name().ok().as_deref() == Some(name));
        match found {
            Some(device) => {
                info!("Using requested audio device: {}", name);
                return Ok(device);
            }
            None => warn!(
                "Requested device '{}' not found, falling back to default device",
                name
            ),
        }
    }

    let device = host
        .default_output_device()
        .ok_or_else(|| "No default output device found".to_string())?;
    info!(
        "Using default audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );
    Ok(device)
}

/// Prefer a configuration at the speech sample rate; otherwise use the device default.
fn best_config(
    device: &Device,
    sample_rate: u32,
) -> std::result::Result<(StreamConfig, SampleFormat), String> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| format!("Failed to get device configs: {}", e))?
        .filter(|c| {
            c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate
        })
        .min_by_key(|c| (c.sample_format() != SampleFormat::F32, c.channels()));

    if let Some(config) = supported {
        let sample_format = config.sample_format();
        return Ok((
            config.with_sample_rate(cpal::SampleRate(sample_rate)).config(),
            sample_format,
        ));
    }

    let config = device
        .default_output_config()
        .map_err(|e| format!("Failed to get default config: {}", e))?;
    Ok((config.config(), config.sample_format()))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    active: Arc<Mutex<Option<ActiveSource>>>,
    error_flag: Arc<AtomicBool>,
) -> std::result::Result<Stream, String>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                render(data, channels, &active);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| format!("Failed to build stream: {}", e))
}

/// Fill one device buffer from the active source, silence once it is exhausted
fn render<T>(data: &mut [T], channels: usize, active: &Mutex<Option<ActiveSource>>)
where
    T: SizedSample + FromSample<f32>,
{
    let mut finished = None;
    {
        let mut source = active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for frame in data.chunks_mut(channels.max(1)) {
            let next = source.as_mut().and_then(ActiveSource::next_sample);
            let value = match next {
                Some(sample) => sample,
                None => {
                    if let Some(done) = source.take() {
                        finished = Some(done.handle);
                    }
                    0.0
                }
            };

            let out = T::from_sample_(value.clamp(-1.0, 1.0));
            for slot in frame.iter_mut() {
                *slot = out;
            }
        }
    }

    // Outside the lock: the completion callback may reach back into the context
    if let Some(handle) = finished {
        handle.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn source(samples: Vec<f32>, step: f64, counter: Arc<AtomicUsize>) -> ActiveSource {
        ActiveSource {
            samples,
            position: 0.0,
            step,
            handle: PlaybackHandle::new(
                1,
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            ),
        }
    }

    #[test]
    fn test_render_fans_mono_to_all_channels() {
        let ended = Arc::new(AtomicUsize::new(0));
        let active = Mutex::new(Some(source(vec![0.5, -0.5], 1.0, ended.clone())));

        let mut data = [0.0f32; 6];
        render(&mut data, 2, &active);

        assert_eq!(data, [0.5, 0.5, -0.5, -0.5, 0.0, 0.0]);
        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert!(active.lock().unwrap().is_none());
    }

    #[test]
    fn test_render_steps_through_source_at_other_rates() {
        let ended = Arc::new(AtomicUsize::new(0));
        // 24 kHz source on a 48 kHz device: every sample rendered twice
        let active = Mutex::new(Some(source(vec![0.25, 0.75], 0.5, ended.clone())));

        let mut data = [0.0f32; 4];
        render(&mut data, 1, &active);
        assert_eq!(data, [0.25, 0.25, 0.75, 0.75]);
        assert_eq!(ended.load(Ordering::SeqCst), 0);

        render(&mut data, 1, &active);
        assert_eq!(data, [0.0; 4]);
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_silence_without_source() {
        let active = Mutex::new(None);
        let mut data = [1i16; 4];
        render(&mut data, 2, &active);
        assert_eq!(data, [0; 4]);
    }
}
