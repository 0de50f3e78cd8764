//! Biometric authentication gate.
//!
//! Serializes access to the platform authenticator and keeps the user's
//! opt-in flags in the secure store. Only one challenge can be on screen at a
//! time: a second caller is turned away, never queued.

use crate::{
    CoreError, CoreResult, FailureKind,
    biometric::{BiometricConfig, BiometricIcon, BiometricSnapshot},
    platform::{BiometricDriver, BiometricKind, CapabilityProbe, SecureStore},
    state::{StateContainer, Subscription},
};

use std::{collections::BTreeSet, panic::Location, sync::Arc};

use error_location::ErrorLocation;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

const TRUE: &str = "true";
const FALSE: &str = "false";

/// Claim on the authenticator, held for one challenge.
///
/// The claim lives in the snapshot itself: acquiring it raises
/// `is_authenticating` under the state lock, so the flag and the
/// single-flight check can never disagree. Dropping it lowers the flag
/// unless [`BiometricGateController::stop_authentication`] already released
/// this challenge and a newer one holds the gate.
struct ChallengeClaim<'a> {
    state: &'a StateContainer<BiometricSnapshot>,
    generation: u64,
}

impl<'a> ChallengeClaim<'a> {
    fn acquire(state: &'a StateContainer<BiometricSnapshot>) -> Option<Self> {
        let mut generation = 0;
        let acquired = state.update_if(|s| {
            if s.authenticating {
                return false;
            }
            s.authenticating = true;
            s.challenge += 1;
            generation = s.challenge;
            true
        });

        if !acquired {
            return None;
        }
        Some(Self { state, generation })
    }
}

impl Drop for ChallengeClaim<'_> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.state.update_if(|s| {
            if s.challenge != generation || !s.authenticating {
                return false;
            }
            s.authenticating = false;
            true
        });
    }
}

/// Owns the lifecycle of the biometric-authentication capability.
///
/// Like the recording controller, no operation returns an error. Failures
/// are logged, recorded as [`BiometricSnapshot::last_failure`], and reported
/// as `false`.
pub struct BiometricGateController {
    probe: Arc<dyn CapabilityProbe>,
    driver: Arc<dyn BiometricDriver>,
    store: Arc<dyn SecureStore>,
    config: BiometricConfig,
    state: StateContainer<BiometricSnapshot>,
}

impl BiometricGateController {
    /// Create the gate, restore persisted flags and probe the device.
    #[instrument(skip_all)]
    pub async fn new(
        probe: Arc<dyn CapabilityProbe>,
        driver: Arc<dyn BiometricDriver>,
        store: Arc<dyn SecureStore>,
        config: BiometricConfig,
    ) -> Self {
        let controller = Self {
            probe,
            driver,
            store,
            config,
            state: StateContainer::new(BiometricSnapshot::default()),
        };

        controller.load_persisted().await;
        controller.check_biometric_availability().await;

        controller
    }

    /// Current snapshot. No side effects.
    pub fn snapshot(&self) -> BiometricSnapshot {
        self.state.snapshot()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> Subscription<BiometricSnapshot> {
        self.state.subscribe()
    }

    /// Display name of the preferred enrolled biometric kind.
    pub fn biometric_type_name(&self) -> &'static str {
        self.state.read(BiometricSnapshot::biometric_type_name)
    }

    /// Icon of the preferred enrolled biometric kind.
    pub fn biometric_icon(&self) -> BiometricIcon {
        self.state.read(BiometricSnapshot::biometric_icon)
    }

    /// Probe device support and enrolled kinds.
    ///
    /// Returns whether biometrics can be used. A failing probe counts as
    /// unavailable.
    #[instrument(skip(self))]
    pub async fn check_biometric_availability(&self) -> bool {
        let probed = self.probe_capability().await;
        let checked_at = Instant::now();

        match probed {
            Ok(kinds) => {
                let available = !kinds.is_empty();
                info!(available, kinds = ?kinds, "Biometric availability checked");
                self.state.update(|s| {
                    s.available = available;
                    s.supported_kinds = kinds;
                    s.checked_at = Some(checked_at);
                });
                available
            }
            Err(e) => {
                warn!(error = %e, "Biometric capability probe failed");
                self.state.update(|s| {
                    s.available = false;
                    s.supported_kinds.clear();
                    s.checked_at = Some(checked_at);
                });
                false
            }
        }
    }

    /// Opt in to biometric login behind one challenge.
    #[instrument(skip(self))]
    pub async fn enable_biometric(&self) -> bool {
        if !self.ensure_available().await {
            info!("Biometrics unavailable, cannot enable");
            self.record_failure(FailureKind::PreconditionNotMet);
            return false;
        }

        if !self.challenge_passed("enable", &self.config.enable_reason).await {
            return false;
        }

        if let Err(e) = self.store.write(&self.config.enabled_key, TRUE).await {
            error!(error = %e, "Failed to persist biometric enablement");
            self.record_failure(e.kind());
            return false;
        }

        self.state.update(|s| {
            s.enabled = true;
            s.last_failure = None;
        });
        info!("Biometric login enabled");

        true
    }

    /// Complete biometric setup. Requires biometric login to be enabled;
    /// otherwise returns `false` without touching the authenticator.
    #[instrument(skip(self))]
    pub async fn enroll_biometric(&self) -> bool {
        if !self.state.read(BiometricSnapshot::is_enabled) {
            let e = CoreError::PreconditionNotMet {
                reason: "biometric login is not enabled".to_string(),
                location: ErrorLocation::from(Location::caller()),
            };
            info!(error = %e, "Enrollment refused");
            self.record_failure(e.kind());
            return false;
        }

        if !self.challenge_passed("enroll", &self.config.enroll_reason).await {
            return false;
        }

        if let Err(e) = self.store.write(&self.config.enrolled_key, TRUE).await {
            error!(error = %e, "Failed to persist biometric enrollment");
            self.record_failure(e.kind());
            return false;
        }

        self.state.update(|s| {
            s.enrolled = true;
            s.last_failure = None;
        });
        info!("Biometric enrollment complete");

        true
    }

    /// Opt out of biometric login.
    ///
    /// A fresh challenge is shown first. Once it has run without a platform
    /// error, both flags are cleared and `true` is returned, whether or not
    /// the user passed it. A platform error or a concurrent challenge leaves
    /// the flags untouched and returns `false`.
    #[instrument(skip(self))]
    pub async fn disable_biometric(&self) -> bool {
        let passed = match self.challenge("disable", &self.config.disable_reason).await {
            Ok(passed) => passed,
            Err(e) => {
                warn!(error = %e, "Disable challenge did not run");
                self.record_failure(e.kind());
                return false;
            }
        };

        if !passed {
            info!("Disable challenge not passed, disabling anyway");
        }

        for key in [&self.config.enabled_key, &self.config.enrolled_key] {
            if let Err(e) = self.store.write(key, FALSE).await {
                warn!(key = %key, error = %e, "Failed to persist biometric opt-out");
            }
        }

        self.state.update(|s| {
            s.enabled = false;
            s.enrolled = false;
            s.last_failure = None;
        });
        info!("Biometric login disabled");

        true
    }

    /// Show one biometric challenge.
    ///
    /// Returns `false` immediately, without calling the authenticator, if
    /// another challenge is already in flight. Platform errors also return
    /// `false`.
    #[instrument(skip(self))]
    pub async fn authenticate(&self, reason: &str) -> bool {
        match self.challenge("authenticate", reason).await {
            Ok(passed) => {
                if passed {
                    self.state.update(|s| s.last_failure = None);
                }
                passed
            }
            Err(e) => {
                self.record_failure(e.kind());
                false
            }
        }
    }

    /// Ask the authenticator to dismiss any challenge on screen. Safe to call
    /// when nothing is in flight.
    ///
    /// The gate reopens immediately: a new challenge may start while the
    /// dismissed one is still unwinding in the driver.
    #[instrument(skip(self))]
    pub async fn stop_authentication(&self) {
        if let Err(e) = self.driver.cancel().await {
            debug!(error = %e, "Authenticator cancel failed, ignoring");
        }
        self.state.update(|s| s.authenticating = false);
    }

    /// Delete both persisted flags and reset them in memory.
    ///
    /// Store failures are logged and ignored; the in-memory flags are
    /// cleared regardless.
    #[instrument(skip(self))]
    pub async fn clear_biometric_data(&self) {
        for key in [&self.config.enabled_key, &self.config.enrolled_key] {
            if let Err(e) = self.store.delete(key).await {
                debug!(key = %key, error = %e, "Failed to delete biometric flag, ignoring");
            }
        }

        self.state.update(|s| {
            s.enabled = false;
            s.enrolled = false;
        });
        info!("Biometric data cleared");
    }

    async fn probe_capability(&self) -> CoreResult<BTreeSet<BiometricKind>> {
        if !self.probe.supports_biometrics().await? {
            return Ok(BTreeSet::new());
        }
        self.probe.enrolled_biometric_kinds().await
    }

    /// Re-probe unless a positive check is still fresh.
    async fn ensure_available(&self) -> bool {
        let ttl = self.config.availability_ttl();
        let fresh = self.state.read(|s| {
            s.available && s.checked_at.is_some_and(|at| at.elapsed() < ttl)
        });

        if fresh {
            return true;
        }
        self.check_biometric_availability().await
    }

    /// Run one challenge through the single-flight guard.
    #[track_caller]
    fn challenge<'a>(
        &'a self,
        operation: &'static str,
        reason: &'a str,
    ) -> impl Future<Output = CoreResult<bool>> + Send + 'a {
        let location = ErrorLocation::from(Location::caller());

        async move {
            let Some(_claim) = ChallengeClaim::acquire(&self.state) else {
                warn!(operation, "Challenge already in flight, rejecting");
                return Err(CoreError::ConcurrencyRejected {
                    operation,
                    location,
                });
            };

            debug!(operation, reason, "Presenting biometric challenge");

            match self.driver.authenticate(reason).await {
                Ok(passed) => {
                    info!(operation, passed, "Biometric challenge finished");
                    Ok(passed)
                }
                Err(e) => {
                    error!(operation, error = %e, "Biometric challenge failed");
                    Err(e)
                }
            }
        }
    }

    /// Challenge helper for operations that only proceed on a pass.
    async fn challenge_passed(&self, operation: &'static str, reason: &str) -> bool {
        match self.challenge(operation, reason).await {
            Ok(true) => true,
            Ok(false) => {
                info!(operation, "Biometric challenge not passed");
                false
            }
            Err(e) => {
                self.record_failure(e.kind());
                false
            }
        }
    }

    fn record_failure(&self, kind: FailureKind) {
        self.state.update(|s| s.last_failure = Some(kind));
    }

    async fn load_persisted(&self) {
        let enabled = self.read_flag(&self.config.enabled_key).await;
        let enrolled = self.read_flag(&self.config.enrolled_key).await;

        if enrolled && !enabled {
            warn!("Stored enrollment without enablement, treating as not enrolled");
        }

        self.state.update(|s| {
            s.enabled = enabled;
            s.enrolled = enrolled;
        });
        debug!(enabled, enrolled, "Persisted biometric flags loaded");
    }

    async fn read_flag(&self, key: &str) -> bool {
        match self.store.read(key).await {
            Ok(Some(value)) => value.parse().unwrap_or_else(|_| {
                warn!(key, value = %value, "Unparsable biometric flag, treating as false");
                false
            }),
            Ok(None) => false,
            Err(e) => {
                warn!(key, error = %e, "Failed to read biometric flag, treating as false");
                false
            }
        }
    }
}
