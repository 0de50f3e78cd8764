use std::collections::BTreeSet;

use async_trait::async_trait;
use cpal::traits::HostTrait;
use savitri_core::{BiometricKind, CapabilityProbe, CoreError, CoreResult, PermissionStatus};
use tracing::{debug, instrument};

/// Capability probe backed by cpal device enumeration.
///
/// Desktop platforms have no microphone permission dialog that cpal can
/// drive, so an available default input device reads as `Granted` and a
/// missing one as `Restricted`.
pub(crate) struct DesktopProbe {
    prompt_authenticator: bool,
}

impl DesktopProbe {
    pub(crate) fn new(prompt_authenticator: bool) -> Self {
        Self {
            prompt_authenticator,
        }
    }

    async fn input_device_present(&self) -> CoreResult<bool> {
        let present = tokio::task::spawn_blocking(|| {
            cpal::default_host().default_input_device().is_some()
        })
        .await
        .map_err(|e| CoreError::driver("probe_input_device", e))?;

        debug!(present, "Queried default input device");
        Ok(present)
    }

    async fn status(&self) -> CoreResult<PermissionStatus> {
        Ok(if self.input_device_present().await? {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Restricted
        })
    }
}

#[async_trait]
impl CapabilityProbe for DesktopProbe {
    async fn supports_microphone(&self) -> CoreResult<bool> {
        self.input_device_present().await
    }

    async fn microphone_permission_status(&self) -> CoreResult<PermissionStatus> {
        self.status().await
    }

    #[instrument(skip(self))]
    async fn request_microphone_permission(&self) -> CoreResult<PermissionStatus> {
        self.status().await
    }

    async fn supports_biometrics(&self) -> CoreResult<bool> {
        Ok(self.prompt_authenticator)
    }

    async fn enrolled_biometric_kinds(&self) -> CoreResult<BTreeSet<BiometricKind>> {
        if self.prompt_authenticator {
            Ok(BTreeSet::from([BiometricKind::Weak]))
        } else {
            Ok(BTreeSet::new())
        }
    }
}
