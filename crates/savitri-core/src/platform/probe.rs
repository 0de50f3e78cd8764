use crate::{CoreResult, platform::BiometricKind};

use std::{collections::BTreeSet, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Microphone permission as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Access allowed.
    Granted,
    /// User refused access.
    Denied,
    /// Access blocked by policy or missing hardware; the user cannot grant it.
    Restricted,
    /// The user has not been asked yet.
    Undetermined,
}

impl PermissionStatus {
    /// Whether the resource may be used.
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PermissionStatus::Granted => "granted",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Restricted => "restricted",
            PermissionStatus::Undetermined => "undetermined",
        };
        f.write_str(s)
    }
}

/// Reports what the device and OS permit without performing the privileged
/// action itself.
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    /// Whether the device has a usable microphone.
    async fn supports_microphone(&self) -> CoreResult<bool>;

    /// Current microphone permission, without prompting.
    async fn microphone_permission_status(&self) -> CoreResult<PermissionStatus>;

    /// Prompt for microphone permission and return the resulting status.
    async fn request_microphone_permission(&self) -> CoreResult<PermissionStatus>;

    /// Whether the device and OS support biometric authentication at all.
    async fn supports_biometrics(&self) -> CoreResult<bool>;

    /// Biometric kinds the user has enrolled on the device.
    async fn enrolled_biometric_kinds(&self) -> CoreResult<BTreeSet<BiometricKind>>;
}
