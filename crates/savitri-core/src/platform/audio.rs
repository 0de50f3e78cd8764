use crate::CoreResult;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Raw PCM byte chunks produced while a capture is running.
///
/// The sender side is dropped by the driver when the capture ends.
pub type AudioChunkReceiver = mpsc::Receiver<Vec<u8>>;

/// Fixed capture format requested from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 = mono).
    pub channels: u16,
    /// Bits per sample in the produced artifact.
    pub bits_per_sample: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

/// Instantaneous and peak input level in decibels (0 dB = full scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amplitude {
    /// Level of the most recent audio block.
    pub current: f64,
    /// Highest level seen since the capture started.
    pub max: f64,
}

/// Platform microphone recorder.
///
/// At most one capture is active per driver. The controller guarantees it
/// calls `stop` (or `release`) before the next `start`.
#[async_trait]
pub trait AudioDriver: Send + Sync {
    /// Begin capturing into the artifact at `path`.
    async fn start(&self, config: &CaptureConfig, path: &Path) -> CoreResult<AudioChunkReceiver>;

    /// Finish the capture and return the artifact path, if one was produced.
    async fn stop(&self) -> CoreResult<Option<PathBuf>>;

    /// Suspend capture without closing the artifact.
    async fn pause(&self) -> CoreResult<()>;

    /// Continue a paused capture.
    async fn resume(&self) -> CoreResult<()>;

    /// Current input level.
    async fn amplitude(&self) -> CoreResult<Amplitude>;

    /// Tear down any capture and free the device. Must not fail and must be
    /// safe to call repeatedly.
    async fn release(&self);
}
