//! Savitri Core Library
//!
//! Session and resource state machines for the Savitri companion app: a
//! microphone recording session controller and a biometric authentication
//! gate. Both guard exclusive access to a scarce, fallible platform resource
//! and publish an observable snapshot that UI code reads but never writes.
//!
//! Platform access goes through the collaborator traits in [`platform`];
//! the host application supplies implementations.
//!
//! # Example
//!
//! ```no_run
//! use savitri_core::{
//!     AudioDriver, CapabilityProbe, RecordingConfig, RecordingSessionController,
//! };
//!
//! use std::sync::Arc;
//!
//! async fn record(probe: Arc<dyn CapabilityProbe>, driver: Arc<dyn AudioDriver>) {
//!     let controller =
//!         RecordingSessionController::new(probe, driver, RecordingConfig::new("recordings"));
//!
//!     if controller.start_recording().await {
//!         tokio::time::sleep(std::time::Duration::from_secs(3)).await;
//!         let artifact = controller.stop_recording().await;
//!         println!("Recorded to {:?}", artifact);
//!     }
//!
//!     controller.dispose().await;
//! }
//! ```

mod biometric;
mod error;
pub mod platform;
mod recording;
mod state;

pub use {
    biometric::{BiometricConfig, BiometricGateController, BiometricIcon, BiometricSnapshot},
    error::{CoreError, FailureKind, Result as CoreResult},
    platform::{
        Amplitude, AudioChunkReceiver, AudioDriver, BiometricDriver, BiometricKind,
        CapabilityProbe, CaptureConfig, PermissionStatus, SecureStore,
    },
    recording::{RecordingConfig, RecordingSessionController, RecordingSnapshot, RecordingState},
    state::{StateContainer, Subscription},
};
