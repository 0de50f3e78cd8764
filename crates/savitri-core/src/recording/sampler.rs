//! Periodic amplitude polling for an active recording.

use crate::{
    platform::AudioDriver,
    recording::{RecordingSnapshot, RecordingState},
    state::StateContainer,
};

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, trace};

/// Map a decibel level onto `[0.0, 1.0]` as `clamp((db + K) / K, 0, 1)`.
///
/// Non-finite input and a non-positive `floor_db` map to 0.0.
pub(crate) fn normalize_amplitude(current_db: f64, floor_db: f64) -> f64 {
    if floor_db <= 0.0 {
        return 0.0;
    }
    let level = (current_db + floor_db) / floor_db;
    if level.is_nan() {
        return 0.0;
    }
    level.clamp(0.0, 1.0)
}

pub(crate) struct SamplerSpec {
    pub(crate) interval: Duration,
    pub(crate) floor_db: f64,
    pub(crate) epoch: u64,
}

/// Spawn the sampling loop for one `Recording` span.
///
/// The loop exits on its own once the span's epoch is gone, but callers
/// still abort and await the handle so that nothing runs after the
/// transition returns.
pub(crate) fn spawn_sampler(
    driver: Arc<dyn AudioDriver>,
    state: Arc<StateContainer<RecordingSnapshot>>,
    spec: SamplerSpec,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(spec.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick of an interval completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let reading = match driver.amplitude().await {
                Ok(reading) => reading,
                Err(e) => {
                    debug!(error = %e, "Amplitude poll failed, skipping tick");
                    continue;
                }
            };

            let level = normalize_amplitude(reading.current, spec.floor_db);
            let published = state.update_if(|s| {
                if s.state != RecordingState::Recording || s.epoch != spec.epoch {
                    return false;
                }
                s.amplitude = level;
                true
            });

            if !published {
                trace!(epoch = spec.epoch, "Sampler outlived its span");
                break;
            }

            trace!(
                current_db = reading.current,
                max_db = reading.max,
                level,
                "Amplitude sampled"
            );
        }
    })
}
