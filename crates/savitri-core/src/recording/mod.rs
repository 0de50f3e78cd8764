mod config;
mod controller;
mod sampler;
mod state;

pub use {
    config::RecordingConfig,
    controller::RecordingSessionController,
    state::{RecordingSnapshot, RecordingState},
};

#[cfg(test)]
pub(crate) use sampler::normalize_amplitude;
