use crate::FailureKind;

use std::{fmt, path::PathBuf, time::Duration};

use tokio::time::Instant;
use uuid::Uuid;

/// Lifecycle state of the recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordingState {
    /// No session.
    #[default]
    Idle,
    /// Capturing audio.
    Recording,
    /// Session open, capture suspended.
    Paused,
    /// Last operation failed. Recover with a new start.
    Error,
}

impl RecordingState {
    /// Whether a resource handle is held in this state.
    pub fn is_active(self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Paused)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordingState::Idle => "idle",
            RecordingState::Recording => "recording",
            RecordingState::Paused => "paused",
            RecordingState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a recording session.
///
/// Invariants: `amplitude` is nonzero only while `Recording`;
/// `resource_path` and `session_id` are set only while `Recording` or `Paused`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordingSnapshot {
    /// Lifecycle state.
    pub state: RecordingState,
    /// Artifact being written by the active session.
    pub resource_path: Option<PathBuf>,
    /// Normalized input level in `[0.0, 1.0]`.
    pub amplitude: f64,
    /// Log correlation ID of the active session.
    pub session_id: Option<Uuid>,
    /// Why the session last entered `Error`.
    pub last_failure: Option<FailureKind>,

    /// Recording time banked before the current `Recording` span.
    pub(crate) accumulated: Duration,
    /// Start of the current `Recording` span.
    pub(crate) resumed_at: Option<Instant>,
    /// Bumped on every transition into or out of `Recording`. A sampler only
    /// publishes while the epoch it was spawned with is still current.
    pub(crate) epoch: u64,
}

impl RecordingSnapshot {
    /// Elapsed recording time, excluding paused spans. Zero unless a session
    /// is active.
    pub fn duration(&self) -> Duration {
        match self.state {
            RecordingState::Recording => {
                self.accumulated
                    + self
                        .resumed_at
                        .map(|at| at.elapsed())
                        .unwrap_or_default()
            }
            RecordingState::Paused => self.accumulated,
            RecordingState::Idle | RecordingState::Error => Duration::ZERO,
        }
    }

    /// Drop all per-session fields and enter `state`.
    pub(crate) fn clear_session(&mut self, state: RecordingState) {
        self.state = state;
        self.resource_path = None;
        self.amplitude = 0.0;
        self.session_id = None;
        self.accumulated = Duration::ZERO;
        self.resumed_at = None;
        self.epoch += 1;
    }
}
