use crate::CoreResult;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A category of biometric authentication.
///
/// Variant order is display priority: `Face` wins over `Fingerprint`, and so
/// on. `Strong`/`Weak` are the generic classes some platforms report instead
/// of a concrete sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    /// Face recognition.
    Face,
    /// Fingerprint sensor.
    Fingerprint,
    /// Iris scanner.
    Iris,
    /// Platform-classified strong biometric of unspecified kind.
    Strong,
    /// Platform-classified weak biometric of unspecified kind.
    Weak,
}

/// Platform biometric authenticator.
#[async_trait]
pub trait BiometricDriver: Send + Sync {
    /// Show one biometric challenge. `Ok(false)` means the user failed or
    /// dismissed it; `Err` means the platform call itself failed.
    async fn authenticate(&self, reason: &str) -> CoreResult<bool>;

    /// Ask the platform to dismiss an in-flight challenge.
    async fn cancel(&self) -> CoreResult<()>;
}
