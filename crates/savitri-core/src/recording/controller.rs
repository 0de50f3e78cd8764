//! Microphone session controller.
//!
//! Mediates all access to the audio driver so that at most one capture is
//! ever active. Operations are serialized by an async mutex; a second caller
//! waits for the first to finish its transition and then acts on the state
//! that transition produced.

use crate::{
    CoreError, CoreResult, FailureKind,
    platform::{AudioChunkReceiver, AudioDriver, CapabilityProbe, PermissionStatus},
    recording::{
        RecordingConfig, RecordingSnapshot, RecordingState,
        sampler::{SamplerSpec, spawn_sampler},
    },
    state::{StateContainer, Subscription},
};

use std::{
    panic::Location,
    path::PathBuf,
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use error_location::ErrorLocation;
use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Background work owned by the active session.
#[derive(Default)]
struct SessionTasks {
    sampler: Option<JoinHandle<()>>,
    forwarder: Option<JoinHandle<()>>,
}

/// Owns the lifecycle of one audio-capture session.
///
/// State is published through a [`StateContainer`]; callers observe it via
/// [`subscribe`](Self::subscribe) and never mutate it. No operation returns
/// an error: failures are logged, the session moves to
/// [`RecordingState::Error`], and the operation returns `false`/`None`.
pub struct RecordingSessionController {
    probe: Arc<dyn CapabilityProbe>,
    driver: Arc<dyn AudioDriver>,
    config: RecordingConfig,
    state: Arc<StateContainer<RecordingSnapshot>>,
    tasks: Mutex<SessionTasks>,
    /// Raw audio fan-out for the active session. Dropping it closes every
    /// observer's stream.
    audio_tx: StdMutex<Option<broadcast::Sender<Vec<u8>>>>,
    sequence: AtomicU64,
    disposed: AtomicBool,
}

impl RecordingSessionController {
    /// Create an idle controller.
    pub fn new(
        probe: Arc<dyn CapabilityProbe>,
        driver: Arc<dyn AudioDriver>,
        config: RecordingConfig,
    ) -> Self {
        Self {
            probe,
            driver,
            config,
            state: Arc::new(StateContainer::new(RecordingSnapshot::default())),
            tasks: Mutex::new(SessionTasks::default()),
            audio_tx: StdMutex::new(None),
            sequence: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Current snapshot. No side effects.
    pub fn snapshot(&self) -> RecordingSnapshot {
        self.state.snapshot()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecordingState {
        self.state.read(|s| s.state)
    }

    /// Whether audio is being captured right now.
    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Artifact path of the active session.
    pub fn current_recording_path(&self) -> Option<PathBuf> {
        self.state.read(|s| s.resource_path.clone())
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> Subscription<RecordingSnapshot> {
        self.state.subscribe()
    }

    /// Raw PCM chunks of the active session.
    ///
    /// `None` unless a session is `Recording` or `Paused`. The stream closes
    /// when the session ends.
    pub fn raw_audio_stream(&self) -> Option<broadcast::Receiver<Vec<u8>>> {
        self.audio_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    /// Elapsed recording time excluding pauses; zero when no session is active.
    pub fn recording_duration(&self) -> Duration {
        self.state.read(RecordingSnapshot::duration)
    }

    /// Ensure microphone permission, prompting if the user has not been asked.
    ///
    /// Returns `true` iff permission is granted afterwards. Denial and probe
    /// failures both return `false`.
    #[instrument(skip(self))]
    pub async fn check_and_request_permissions(&self) -> bool {
        match self.acquire_permission().await {
            Ok(()) => true,
            Err(e) => {
                info!(error = %e, "Microphone permission not granted");
                false
            }
        }
    }

    async fn acquire_permission(&self) -> CoreResult<()> {
        if !self.probe.supports_microphone().await? {
            return Err(CoreError::PermissionDenied {
                status: PermissionStatus::Restricted,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let status = match self.probe.microphone_permission_status().await? {
            PermissionStatus::Undetermined => {
                debug!("Microphone permission undetermined, requesting");
                self.probe.request_microphone_permission().await?
            }
            status => status,
        };

        if !status.is_granted() {
            return Err(CoreError::PermissionDenied {
                status,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }

    /// Start a new recording.
    ///
    /// An active session is stopped first; its artifact is finalized by the
    /// driver but its path is not returned. On success the session is
    /// `Recording`, amplitude sampling runs, and
    /// [`raw_audio_stream`](Self::raw_audio_stream) is available.
    #[instrument(skip(self))]
    pub async fn start_recording(&self) -> bool {
        if self.is_disposed("start") {
            return false;
        }

        let mut tasks = self.tasks.lock().await;

        if self.state.read(|s| s.state.is_active()) {
            let previous = self.current_recording_path();
            info!(previous = ?previous, "Stopping active session before starting a new one");
            self.stop_background(&mut tasks).await;
            if let Err(e) = self.driver.stop().await {
                warn!(error = %e, "Previous session did not stop cleanly, releasing driver");
                self.driver.release().await;
            }
            self.state.update(|s| s.clear_session(RecordingState::Idle));
        }

        if let Err(e) = self.acquire_permission().await {
            warn!(error = %e, "Cannot start recording without microphone permission");
            self.fail(&mut tasks, e.kind()).await;
            return false;
        }

        let path = self.next_recording_path();

        let chunks = match self.driver.start(&self.config.capture, &path).await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!(path = ?path, error = %e, "Failed to start recording");
                self.fail(&mut tasks, e.kind()).await;
                return false;
            }
        };

        let session_id = Uuid::new_v4();
        let mut epoch = 0;
        self.state.update(|s| {
            s.state = RecordingState::Recording;
            s.resource_path = Some(path.clone());
            s.amplitude = 0.0;
            s.session_id = Some(session_id);
            s.last_failure = None;
            s.accumulated = Duration::ZERO;
            s.resumed_at = Some(Instant::now());
            s.epoch += 1;
            epoch = s.epoch;
        });

        tasks.forwarder = Some(self.open_audio_stream(chunks));
        tasks.sampler = Some(self.spawn_sampler(epoch));

        info!(session_id = %session_id, path = ?path, "Recording started");

        true
    }

    /// Suspend an active recording. No-op unless `Recording`.
    #[instrument(skip(self))]
    pub async fn pause_recording(&self) -> bool {
        if self.is_disposed("pause") {
            return false;
        }

        let mut tasks = self.tasks.lock().await;
        if self.state() != RecordingState::Recording {
            debug!("Pause ignored, not recording");
            return false;
        }

        Self::stop_sampler(&mut tasks).await;

        if let Err(e) = self.driver.pause().await {
            error!(error = %e, "Failed to pause recording");
            self.fail(&mut tasks, e.kind()).await;
            return false;
        }

        self.state.update(|s| {
            let span = s.resumed_at.take().map(|at| at.elapsed()).unwrap_or_default();
            s.accumulated += span;
            s.state = RecordingState::Paused;
            s.amplitude = 0.0;
            s.epoch += 1;
        });

        info!(session_id = ?self.session_id(), "Recording paused");

        true
    }

    /// Continue a paused recording. No-op unless `Paused`.
    #[instrument(skip(self))]
    pub async fn resume_recording(&self) -> bool {
        if self.is_disposed("resume") {
            return false;
        }

        let mut tasks = self.tasks.lock().await;
        if self.state() != RecordingState::Paused {
            debug!("Resume ignored, not paused");
            return false;
        }

        if let Err(e) = self.driver.resume().await {
            error!(error = %e, "Failed to resume recording");
            self.fail(&mut tasks, e.kind()).await;
            return false;
        }

        let mut epoch = 0;
        self.state.update(|s| {
            s.state = RecordingState::Recording;
            s.resumed_at = Some(Instant::now());
            s.epoch += 1;
            epoch = s.epoch;
        });
        tasks.sampler = Some(self.spawn_sampler(epoch));

        info!(session_id = ?self.session_id(), "Recording resumed");

        true
    }

    /// Finish the active session and return its artifact path.
    ///
    /// `None` when nothing is active or the driver fails to stop.
    #[instrument(skip(self))]
    pub async fn stop_recording(&self) -> Option<PathBuf> {
        if self.is_disposed("stop") {
            return None;
        }

        let mut tasks = self.tasks.lock().await;
        let snapshot = self.state.snapshot();
        if !snapshot.state.is_active() {
            debug!(state = %snapshot.state, "Stop ignored, no active session");
            return None;
        }

        Self::stop_sampler(&mut tasks).await;

        match self.driver.stop().await {
            Ok(produced) => {
                self.close_audio_stream(&mut tasks).await;
                let duration = snapshot.duration();
                let path = produced.or(snapshot.resource_path);
                self.state.update(|s| s.clear_session(RecordingState::Idle));

                info!(
                    session_id = ?snapshot.session_id,
                    path = ?path,
                    duration_ms = duration.as_millis(),
                    "Recording stopped"
                );

                path
            }
            Err(e) => {
                error!(error = %e, "Failed to stop recording");
                self.fail(&mut tasks, e.kind()).await;
                None
            }
        }
    }

    /// Tear everything down regardless of state. Idempotent; every later
    /// operation is a no-op.
    #[instrument(skip(self))]
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            debug!("Already disposed");
            return;
        }

        let mut tasks = self.tasks.lock().await;
        self.stop_background(&mut tasks).await;
        self.driver.release().await;
        self.state.update(|s| s.clear_session(RecordingState::Idle));

        info!("Recording controller disposed");
    }

    fn is_disposed(&self, operation: &'static str) -> bool {
        let disposed = self.disposed.load(Ordering::Acquire);
        if disposed {
            warn!(operation, "Recording controller already disposed");
        }
        disposed
    }

    fn session_id(&self) -> Option<Uuid> {
        self.state.read(|s| s.session_id)
    }

    /// Unique per call: wall-clock millis plus a per-controller sequence.
    fn next_recording_path(&self) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);

        self.config.output_dir.join(format!(
            "{}_{}_{}.{}",
            self.config.file_prefix, millis, seq, self.config.container_extension
        ))
    }

    fn spawn_sampler(&self, epoch: u64) -> JoinHandle<()> {
        spawn_sampler(
            Arc::clone(&self.driver),
            Arc::clone(&self.state),
            SamplerSpec {
                interval: self.config.amplitude_interval(),
                floor_db: self.config.amplitude_floor_db,
                epoch,
            },
        )
    }

    fn open_audio_stream(&self, mut chunks: AudioChunkReceiver) -> JoinHandle<()> {
        let (tx, _) = broadcast::channel(self.config.chunk_buffer.max(1));
        let forward_tx = tx.clone();
        *self.audio_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);

        tokio::spawn(async move {
            while let Some(chunk) = chunks.recv().await {
                // No observers is fine; the chunk is simply dropped.
                let _ = forward_tx.send(chunk);
            }
        })
    }

    async fn stop_sampler(tasks: &mut SessionTasks) {
        if let Some(handle) = tasks.sampler.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    async fn close_audio_stream(&self, tasks: &mut SessionTasks) {
        if let Some(handle) = tasks.forwarder.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.audio_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    async fn stop_background(&self, tasks: &mut SessionTasks) {
        Self::stop_sampler(tasks).await;
        self.close_audio_stream(tasks).await;
    }

    /// Enter `Error`: stop background work, release the driver, clear the
    /// session.
    async fn fail(&self, tasks: &mut SessionTasks, kind: FailureKind) {
        self.stop_background(tasks).await;
        self.driver.release().await;
        self.state.update(|s| {
            s.clear_session(RecordingState::Error);
            s.last_failure = Some(kind);
        });
        warn!(?kind, "Recording session entered error state");
    }
}

impl Drop for RecordingSessionController {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut();
        for handle in [tasks.sampler.take(), tasks.forwarder.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}
