use crate::platform::CaptureConfig;

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_AMPLITUDE_INTERVAL_MS: u64 = 100;
pub(crate) const DEFAULT_AMPLITUDE_FLOOR_DB: f64 = 60.0;
pub(crate) const DEFAULT_CHUNK_BUFFER: usize = 64;

fn default_file_prefix() -> String {
    "recording".to_string()
}

fn default_container_extension() -> String {
    "wav".to_string()
}

fn default_amplitude_interval_ms() -> u64 {
    DEFAULT_AMPLITUDE_INTERVAL_MS
}

fn default_amplitude_floor_db() -> f64 {
    DEFAULT_AMPLITUDE_FLOOR_DB
}

fn default_chunk_buffer() -> usize {
    DEFAULT_CHUNK_BUFFER
}

/// Settings for a [`RecordingSessionController`](crate::RecordingSessionController).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Directory new recordings are written into.
    pub output_dir: PathBuf,

    /// File name prefix for new recordings.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Audio container extension, without the dot.
    #[serde(default = "default_container_extension")]
    pub container_extension: String,

    /// Amplitude sampling period in milliseconds.
    #[serde(default = "default_amplitude_interval_ms")]
    pub amplitude_interval_ms: u64,

    /// Calibration constant K: levels at or below `-K` dB map to 0.0,
    /// 0 dB maps to 1.0.
    #[serde(default = "default_amplitude_floor_db")]
    pub amplitude_floor_db: f64,

    /// Chunks buffered per raw-audio observer before it starts lagging.
    #[serde(default = "default_chunk_buffer")]
    pub chunk_buffer: usize,

    /// Capture format handed to the driver.
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl RecordingConfig {
    /// Defaults with recordings written to `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: default_file_prefix(),
            container_extension: default_container_extension(),
            amplitude_interval_ms: DEFAULT_AMPLITUDE_INTERVAL_MS,
            amplitude_floor_db: DEFAULT_AMPLITUDE_FLOOR_DB,
            chunk_buffer: DEFAULT_CHUNK_BUFFER,
            capture: CaptureConfig::default(),
        }
    }

    /// Amplitude sampling period. Never zero.
    pub fn amplitude_interval(&self) -> Duration {
        Duration::from_millis(self.amplitude_interval_ms.max(1))
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}
