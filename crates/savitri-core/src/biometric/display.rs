use crate::platform::BiometricKind;

use std::collections::BTreeSet;

/// Icon to show next to the biometric option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiometricIcon {
    /// Face outline.
    Face,
    /// Fingerprint.
    Fingerprint,
    /// Eye.
    Eye,
    /// Padlock, for generic or unknown biometrics.
    Lock,
}

impl BiometricIcon {
    /// Stable icon identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            BiometricIcon::Face => "face",
            BiometricIcon::Fingerprint => "fingerprint",
            BiometricIcon::Eye => "eye",
            BiometricIcon::Lock => "lock",
        }
    }
}

/// Highest-priority kind in the set. `BiometricKind`'s ordering is its
/// display priority, so this is the set's minimum.
fn preferred(kinds: &BTreeSet<BiometricKind>) -> Option<BiometricKind> {
    kinds.first().copied()
}

pub(crate) fn type_name(kinds: &BTreeSet<BiometricKind>) -> &'static str {
    match preferred(kinds) {
        Some(BiometricKind::Face) => "Face ID",
        Some(BiometricKind::Fingerprint) => "Fingerprint",
        Some(BiometricKind::Iris) => "Iris",
        Some(BiometricKind::Strong | BiometricKind::Weak) | None => "Biometric",
    }
}

pub(crate) fn icon(kinds: &BTreeSet<BiometricKind>) -> BiometricIcon {
    match preferred(kinds) {
        Some(BiometricKind::Face) => BiometricIcon::Face,
        Some(BiometricKind::Fingerprint) => BiometricIcon::Fingerprint,
        Some(BiometricKind::Iris) => BiometricIcon::Eye,
        Some(BiometricKind::Strong | BiometricKind::Weak) | None => BiometricIcon::Lock,
    }
}
