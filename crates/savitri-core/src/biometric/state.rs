use crate::{
    FailureKind,
    biometric::{BiometricIcon, display},
    platform::BiometricKind,
};

use std::collections::BTreeSet;

use tokio::time::Instant;

/// Point-in-time view of the biometric gate.
///
/// Fields are read through getters so that `is_enrolled` can enforce
/// `enrolled ⇒ enabled` on every read, whatever the store held.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BiometricSnapshot {
    pub(crate) available: bool,
    pub(crate) enabled: bool,
    pub(crate) enrolled: bool,
    pub(crate) authenticating: bool,
    /// Bumped each time a challenge claims the gate.
    pub(crate) challenge: u64,
    pub(crate) supported_kinds: BTreeSet<BiometricKind>,
    pub(crate) last_failure: Option<FailureKind>,
    pub(crate) checked_at: Option<Instant>,
}

impl BiometricSnapshot {
    /// Device and OS support biometrics and at least one kind is enrolled.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// User opted in to biometric login.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Setup completed. Always `false` while not enabled.
    pub fn is_enrolled(&self) -> bool {
        self.enrolled && self.enabled
    }

    /// A challenge is on screen.
    pub fn is_authenticating(&self) -> bool {
        self.authenticating
    }

    /// Biometric kinds enrolled on the device.
    pub fn supported_kinds(&self) -> &BTreeSet<BiometricKind> {
        &self.supported_kinds
    }

    /// Why the last operation failed, if it did.
    pub fn last_failure(&self) -> Option<FailureKind> {
        self.last_failure
    }

    /// Display name of the preferred biometric kind.
    pub fn biometric_type_name(&self) -> &'static str {
        display::type_name(&self.supported_kinds)
    }

    /// Icon of the preferred biometric kind.
    pub fn biometric_icon(&self) -> BiometricIcon {
        display::icon(&self.supported_kinds)
    }
}
