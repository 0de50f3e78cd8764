//! Microphone capture on cpal, written to WAV with hound.
//!
//! cpal streams must stay on the thread that built them, so every stream
//! lives on one dedicated capture thread driven by a command channel. Level
//! metering and pause gating go through shared atomics instead of commands.

use crate::AppResult;

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc as std_mpsc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use async_trait::async_trait;
use cpal::{
    FromSample, Sample, SizedSample, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use hound::{SampleFormat as WavFormat, WavSpec, WavWriter};
use savitri_core::{
    Amplitude, AudioChunkReceiver, AudioDriver, CaptureConfig, CoreError, CoreResult,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

/// Level reported for silence or before the first callback, in dBFS.
pub(crate) const SILENCE_DB: f64 = -160.0;

/// Grace period for an in-flight callback to observe the shutdown flag.
const CALLBACK_DRAIN: Duration = Duration::from_millis(5);

type SharedWriter = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| {
        error!("Capture lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}

/// Average interleaved frames down to one channel of 16-bit PCM.
pub(crate) fn downmix<T>(data: &[T], channels: usize) -> Vec<i16>
where
    T: Sample,
    f32: FromSample<T>,
{
    data.chunks(channels.max(1))
        .map(|frame| {
            let sum: f32 = frame.iter().map(|s| f32::from_sample(*s)).sum();
            let mean = sum / frame.len() as f32;
            (mean.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        })
        .collect()
}

/// Peak level of a block in dBFS, floored at [`SILENCE_DB`].
pub(crate) fn peak_dbfs(samples: &[i16]) -> f64 {
    let peak = samples
        .iter()
        .map(|s| (*s as f64).abs())
        .fold(0.0_f64, f64::max)
        / i16::MAX as f64;

    if peak <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * peak.log10()).max(SILENCE_DB)
    }
}

/// State read by the async side and written by the audio callback.
struct CaptureShared {
    active: AtomicBool,
    paused: AtomicBool,
    level: Mutex<Amplitude>,
}

impl CaptureShared {
    fn reset(&self) {
        self.paused.store(false, Ordering::Release);
        *lock(&self.level) = Amplitude {
            current: SILENCE_DB,
            max: SILENCE_DB,
        };
    }

    fn record_level(&self, db: f64) {
        let mut level = lock(&self.level);
        level.current = db;
        level.max = level.max.max(db);
    }
}

/// Commands sent to the capture thread.
enum CaptureCommand {
    Start {
        config: CaptureConfig,
        path: PathBuf,
        chunk_tx: mpsc::Sender<Vec<u8>>,
        response_tx: oneshot::Sender<Result<(), String>>,
    },
    Stop {
        response_tx: oneshot::Sender<Result<Option<PathBuf>, String>>,
    },
    Shutdown,
}

/// A running stream and the artifact it writes.
struct ActiveCapture {
    stream: Stream,
    writer: SharedWriter,
    shutdown: Arc<AtomicBool>,
    path: PathBuf,
}

/// Desktop [`AudioDriver`].
///
/// This handle is `Send + Sync`; the cpal stream itself never leaves the
/// capture thread.
pub(crate) struct CpalAudioDriver {
    command_tx: std_mpsc::Sender<CaptureCommand>,
    shared: Arc<CaptureShared>,
    thread: Option<JoinHandle<()>>,
}

impl CpalAudioDriver {
    /// Spawn the capture thread.
    #[track_caller]
    pub(crate) fn spawn() -> AppResult<Self> {
        let (command_tx, command_rx) = std_mpsc::channel();
        let shared = Arc::new(CaptureShared {
            active: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            level: Mutex::new(Amplitude {
                current: SILENCE_DB,
                max: SILENCE_DB,
            }),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("savitri-capture".to_string())
            .spawn(move || capture_thread_main(command_rx, thread_shared))?;

        Ok(Self {
            command_tx,
            shared,
            thread: Some(thread),
        })
    }

    #[track_caller]
    fn send(&self, operation: &'static str, command: CaptureCommand) -> CoreResult<()> {
        self.command_tx
            .send(command)
            .map_err(|_| CoreError::driver(operation, "capture thread disconnected"))
    }

    #[track_caller]
    fn require_active(&self, operation: &'static str) -> CoreResult<()> {
        if self.shared.active.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CoreError::driver(operation, "no capture is running"))
        }
    }

    async fn stop_capture(&self) -> CoreResult<Option<PathBuf>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send("stop", CaptureCommand::Stop { response_tx })?;

        response_rx
            .await
            .map_err(|_| CoreError::driver("stop", "capture thread disconnected"))?
            .map_err(|reason| CoreError::driver("stop", reason))
    }
}

#[async_trait]
impl AudioDriver for CpalAudioDriver {
    #[instrument(skip(self))]
    async fn start(&self, config: &CaptureConfig, path: &Path) -> CoreResult<AudioChunkReceiver> {
        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (response_tx, response_rx) = oneshot::channel();

        self.send(
            "start",
            CaptureCommand::Start {
                config: *config,
                path: path.to_path_buf(),
                chunk_tx,
                response_tx,
            },
        )?;

        response_rx
            .await
            .map_err(|_| CoreError::driver("start", "capture thread disconnected"))?
            .map_err(|reason| CoreError::driver("start", reason))?;

        Ok(chunk_rx)
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> CoreResult<Option<PathBuf>> {
        self.stop_capture().await
    }

    async fn pause(&self) -> CoreResult<()> {
        self.require_active("pause")?;
        self.shared.paused.store(true, Ordering::Release);
        debug!("Capture paused");
        Ok(())
    }

    async fn resume(&self) -> CoreResult<()> {
        self.require_active("resume")?;
        self.shared.paused.store(false, Ordering::Release);
        debug!("Capture resumed");
        Ok(())
    }

    async fn amplitude(&self) -> CoreResult<Amplitude> {
        self.require_active("amplitude")?;
        Ok(*lock(&self.shared.level))
    }

    async fn release(&self) {
        if let Err(e) = self.stop_capture().await {
            debug!(error = %e, "Release found nothing to stop");
        }
    }
}

impl Drop for CpalAudioDriver {
    fn drop(&mut self) {
        let _ = self.command_tx.send(CaptureCommand::Shutdown);

        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Capture thread panicked");
        }
    }
}

/// Main loop for the capture thread. Owns every cpal stream.
fn capture_thread_main(command_rx: std_mpsc::Receiver<CaptureCommand>, shared: Arc<CaptureShared>) {
    debug!("Capture thread started");
    let mut active: Option<ActiveCapture> = None;

    while let Ok(command) = command_rx.recv() {
        match command {
            CaptureCommand::Start {
                config,
                path,
                chunk_tx,
                response_tx,
            } => {
                if let Some(previous) = active.take() {
                    warn!(path = ?previous.path, "Start while capturing, finishing previous artifact");
                    if let Err(e) = finish_capture(previous, &shared) {
                        error!(error = %e, "Failed to finish previous artifact");
                    }
                }

                shared.reset();
                let outcome = match open_capture(&config, &path, chunk_tx, &shared) {
                    Ok(capture) => {
                        shared.active.store(true, Ordering::Release);
                        active = Some(capture);
                        Ok(())
                    }
                    Err(reason) => {
                        error!(path = ?path, reason = %reason, "Failed to open capture");
                        Err(reason)
                    }
                };
                let _ = response_tx.send(outcome);
            }
            CaptureCommand::Stop { response_tx } => {
                let outcome = match active.take() {
                    Some(capture) => finish_capture(capture, &shared).map(Some),
                    None => Ok(None),
                };
                let _ = response_tx.send(outcome);
            }
            CaptureCommand::Shutdown => break,
        }
    }

    if let Some(capture) = active.take()
        && let Err(e) = finish_capture(capture, &shared)
    {
        error!(error = %e, "Failed to finish artifact on shutdown");
    }
    debug!("Capture thread stopped");
}

fn open_capture(
    config: &CaptureConfig,
    path: &Path,
    chunk_tx: mpsc::Sender<Vec<u8>>,
    shared: &Arc<CaptureShared>,
) -> Result<ActiveCapture, String> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| "no input device available".to_string())?;

    let supported = device
        .default_input_config()
        .map_err(|e| format!("Failed to get input config: {}", e))?;
    let sample_format = supported.sample_format();
    let fallback: StreamConfig = supported.into();

    let requested = StreamConfig {
        sample_rate: config.sample_rate,
        ..fallback.clone()
    };

    let writer: SharedWriter = Arc::new(Mutex::new(None));
    let shutdown = Arc::new(AtomicBool::new(false));

    let build = |stream_config: &StreamConfig| {
        let callback = CallbackContext {
            channels: stream_config.channels as usize,
            writer: Arc::clone(&writer),
            shutdown: Arc::clone(&shutdown),
            shared: Arc::clone(shared),
            chunk_tx: chunk_tx.clone(),
        };

        match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, stream_config, callback),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, stream_config, callback),
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, stream_config, callback),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, stream_config, callback),
            other => Err(format!("Unsupported sample format: {:?}", other)),
        }
    };

    let (stream, stream_config) = match build(&requested) {
        Ok(stream) => (stream, requested),
        Err(reason) => {
            warn!(
                requested = config.sample_rate,
                fallback = fallback.sample_rate,
                reason = %reason,
                "Requested sample rate rejected, using device default"
            );
            (build(&fallback)?, fallback)
        }
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate: stream_config.sample_rate,
        bits_per_sample: 16,
        sample_format: WavFormat::Int,
    };
    let wav = WavWriter::create(path, spec)
        .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    *lock(&writer) = Some(wav);

    stream
        .play()
        .map_err(|e| format!("Failed to start stream: {}", e))?;

    info!(
        path = ?path,
        sample_rate = stream_config.sample_rate,
        channels = stream_config.channels,
        "Audio capture started"
    );

    Ok(ActiveCapture {
        stream,
        writer,
        shutdown,
        path: path.to_path_buf(),
    })
}

/// Everything the audio callback touches.
struct CallbackContext {
    channels: usize,
    writer: SharedWriter,
    shutdown: Arc<AtomicBool>,
    shared: Arc<CaptureShared>,
    chunk_tx: mpsc::Sender<Vec<u8>>,
}

impl CallbackContext {
    fn on_block<T>(&self, data: &[T])
    where
        T: Sample,
        f32: FromSample<T>,
    {
        if self.shutdown.load(Ordering::Acquire) || self.shared.paused.load(Ordering::Acquire) {
            return;
        }

        let mono = downmix(data, self.channels);
        self.shared.record_level(peak_dbfs(&mono));

        if let Some(writer) = lock(&self.writer).as_mut() {
            for sample in &mono {
                if let Err(e) = writer.write_sample(*sample) {
                    error!(error = %e, "Failed to write sample");
                    break;
                }
            }
        }

        let bytes: Vec<u8> = mono.iter().flat_map(|s| s.to_le_bytes()).collect();
        // Observers that fall behind lose chunks; the artifact does not.
        let _ = self.chunk_tx.try_send(bytes);
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    callback: CallbackContext,
) -> Result<Stream, String>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| callback.on_block(data),
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| format!("Failed to build stream: {}", e))
}

fn finish_capture(capture: ActiveCapture, shared: &CaptureShared) -> Result<PathBuf, String> {
    capture.shutdown.store(true, Ordering::Release);
    shared.active.store(false, Ordering::Release);
    shared.paused.store(false, Ordering::Release);

    drop(capture.stream);
    thread::sleep(CALLBACK_DRAIN);

    let writer = lock(&capture.writer).take();
    if let Some(writer) = writer {
        writer
            .finalize()
            .map_err(|e| format!("Failed to finalize {}: {}", capture.path.display(), e))?;
    }

    info!(path = ?capture.path, "Audio capture stopped");
    Ok(capture.path)
}
