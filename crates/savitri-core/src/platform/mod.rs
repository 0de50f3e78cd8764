//! Collaborator boundaries.
//!
//! Everything the controllers touch outside their own state goes through one
//! of these traits. Implementations live in the host application; the
//! controllers only ever see `Arc<dyn Trait>`.

mod audio;
mod biometric;
mod probe;
mod store;

pub use {
    audio::{Amplitude, AudioChunkReceiver, AudioDriver, CaptureConfig},
    biometric::{BiometricDriver, BiometricKind},
    probe::{CapabilityProbe, PermissionStatus},
    store::SecureStore,
};
