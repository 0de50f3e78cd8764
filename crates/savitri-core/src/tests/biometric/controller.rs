use crate::{
    BiometricConfig, BiometricGateController, BiometricKind, FailureKind,
    tests::fakes::{Challenge, FakeBiometricDriver, FakeProbe, FakeStore},
};

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

const ENABLED_KEY: &str = "biometric_enabled";
const ENROLLED_KEY: &str = "biometric_enrolled";

struct Gate {
    probe: Arc<FakeProbe>,
    driver: Arc<FakeBiometricDriver>,
    store: Arc<FakeStore>,
    controller: BiometricGateController,
}

async fn gate(probe: FakeProbe, driver: FakeBiometricDriver, store: FakeStore) -> Gate {
    let probe = Arc::new(probe);
    let driver = Arc::new(driver);
    let store = Arc::new(store);
    let controller = BiometricGateController::new(
        probe.clone(),
        driver.clone(),
        store.clone(),
        BiometricConfig::default(),
    )
    .await;

    Gate {
        probe,
        driver,
        store,
        controller,
    }
}

async fn default_gate() -> Gate {
    gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Pass),
        FakeStore::default(),
    )
    .await
}

async fn wait_until_authenticating(controller: &BiometricGateController) {
    let mut subscription = controller.subscribe();
    while !subscription.current().is_authenticating() {
        if !subscription.changed().await {
            break;
        }
    }
}

/// WHAT: Construction probes the device and publishes enrolled kinds
/// WHY: The settings screen renders availability immediately
#[tokio::test]
async fn given_supported_device_when_constructed_then_available_with_kinds() {
    // Given: Face and fingerprint enrolled
    let probe = FakeProbe::granted();
    probe.set_kinds([BiometricKind::Face, BiometricKind::Fingerprint]);

    // When: Constructing the gate
    let gate = gate(probe, FakeBiometricDriver::new(Challenge::Pass), FakeStore::default()).await;

    // Then: Available, both kinds known, Face preferred
    let snapshot = gate.controller.snapshot();
    assert!(snapshot.is_available());
    assert_eq!(snapshot.supported_kinds().len(), 2);
    assert_eq!(gate.controller.biometric_type_name(), "Face ID");
    assert_eq!(gate.controller.biometric_icon().as_str(), "face");
    assert_eq!(gate.probe.biometric_probe_calls.load(Ordering::SeqCst), 1);
}

/// WHAT: No biometric support means unavailable and enable never prompts
/// WHY: Prompting on an unsupported device would fail confusingly
#[tokio::test]
async fn given_no_biometric_support_when_enabling_then_false_without_driver() {
    // Given: Device without biometrics
    let gate = gate(
        FakeProbe::without_biometrics(),
        FakeBiometricDriver::new(Challenge::Pass),
        FakeStore::default(),
    )
    .await;

    // When: Checking availability and enabling
    let available = gate.controller.check_biometric_availability().await;
    let enabled = gate.controller.enable_biometric().await;

    // Then: Both false, authenticator untouched
    assert!(!available);
    assert!(!enabled);
    assert_eq!(gate.driver.calls(), 0);
    assert!(!gate.controller.snapshot().is_enabled());
    assert_eq!(
        gate.controller.snapshot().last_failure(),
        Some(FailureKind::PreconditionNotMet)
    );
}

/// WHAT: Supported hardware with nothing enrolled is unavailable
/// WHY: A challenge cannot succeed without an enrolled biometric
#[tokio::test]
async fn given_supported_but_nothing_enrolled_when_checking_then_unavailable() {
    // Given: Supported, no kinds enrolled
    let probe = FakeProbe::granted();
    probe.set_kinds([]);
    let gate = gate(probe, FakeBiometricDriver::new(Challenge::Pass), FakeStore::default()).await;

    // When/Then: Unavailable
    assert!(!gate.controller.check_biometric_availability().await);
    assert!(gate.controller.snapshot().supported_kinds().is_empty());
}

/// WHAT: A throwing probe reads as unavailable
/// WHY: Availability checks never propagate errors
#[tokio::test]
async fn given_probe_failure_when_checking_then_unavailable() {
    // Given: Gate constructed while available, then the probe breaks
    let gate = default_gate().await;
    assert!(gate.controller.snapshot().is_available());
    gate.probe.fail_biometric_probe.store(true, Ordering::SeqCst);

    // When: Re-checking
    let available = gate.controller.check_biometric_availability().await;

    // Then: Unavailable and kinds cleared
    assert!(!available);
    assert!(!gate.controller.snapshot().is_available());
    assert!(gate.controller.snapshot().supported_kinds().is_empty());
}

/// WHAT: Enabling with a passing challenge persists the opt-in
/// WHY: The opt-in must survive restarts
#[tokio::test]
async fn given_available_when_enabling_with_passing_challenge_then_enabled_and_persisted() {
    // Given: Available device, user will pass
    let gate = default_gate().await;

    // When: Enabling
    let enabled = gate.controller.enable_biometric().await;

    // Then: Enabled in memory and in the store, fixed justification shown
    assert!(enabled);
    assert!(gate.controller.snapshot().is_enabled());
    assert_eq!(gate.store.get(ENABLED_KEY).as_deref(), Some("true"));
    assert_eq!(gate.driver.reasons(), vec!["enable biometric login".to_string()]);
}

/// WHAT: A failed or erroring challenge leaves the gate disabled
/// WHY: Opt-in requires the user to prove presence
#[tokio::test]
async fn given_unsuccessful_challenge_when_enabling_then_state_unchanged() {
    for (outcome, failure) in [
        (Challenge::Fail, None),
        (Challenge::Error, Some(FailureKind::DriverFailure)),
    ] {
        // Given: Available device, challenge will not pass
        let gate = gate(
            FakeProbe::granted(),
            FakeBiometricDriver::new(outcome),
            FakeStore::default(),
        )
        .await;

        // When: Enabling
        let enabled = gate.controller.enable_biometric().await;

        // Then: Not enabled, nothing stored
        assert!(!enabled, "outcome {outcome:?}");
        let snapshot = gate.controller.snapshot();
        assert!(!snapshot.is_enabled());
        assert!(!snapshot.is_authenticating());
        assert_eq!(snapshot.last_failure(), failure, "outcome {outcome:?}");
        assert_eq!(gate.store.get(ENABLED_KEY), None);
    }
}

/// WHAT: A store write failure keeps the in-memory flag off
/// WHY: Memory and storage must never disagree in the permissive direction
#[tokio::test]
async fn given_store_write_failure_when_enabling_then_false_and_not_enabled() {
    // Given: Store rejects writes
    let gate = default_gate().await;
    gate.store.fail_writes.store(true, Ordering::SeqCst);

    // When: Enabling
    let enabled = gate.controller.enable_biometric().await;

    // Then: Refused
    assert!(!enabled);
    assert!(!gate.controller.snapshot().is_enabled());
}

/// WHAT: Enable re-probes when availability was negative
/// WHY: The user may have enrolled a fingerprint since the last check
#[tokio::test]
async fn given_previously_unavailable_when_enabling_then_rechecked() {
    // Given: Constructed with nothing enrolled, then the user enrolls
    let probe = FakeProbe::granted();
    probe.set_kinds([]);
    let gate = gate(probe, FakeBiometricDriver::new(Challenge::Pass), FakeStore::default()).await;
    assert!(!gate.controller.snapshot().is_available());
    gate.probe.set_kinds([BiometricKind::Fingerprint]);

    // When: Enabling
    let enabled = gate.controller.enable_biometric().await;

    // Then: Fresh probe found the fingerprint
    assert!(enabled);
    assert_eq!(gate.probe.biometric_probe_calls.load(Ordering::SeqCst), 2);
}

/// WHAT: A positive check goes stale after the configured TTL
/// WHY: Capability can disappear while the app is backgrounded
#[tokio::test(start_paused = true)]
async fn given_stale_availability_when_enabling_then_rechecked() {
    // Given: A fresh positive check
    let gate = default_gate().await;
    assert!(gate.controller.enable_biometric().await);
    assert_eq!(gate.probe.biometric_probe_calls.load(Ordering::SeqCst), 1);

    // When: The TTL passes and the device loses biometrics
    tokio::time::advance(
        BiometricConfig::default().availability_ttl() + Duration::from_secs(1),
    )
    .await;
    gate.probe.biometrics_supported.store(false, Ordering::SeqCst);
    let enabled = gate.controller.enable_biometric().await;

    // Then: Re-probed and refused
    assert!(!enabled);
    assert_eq!(gate.probe.biometric_probe_calls.load(Ordering::SeqCst), 2);
}

/// WHAT: Enrollment is refused whenever enablement is off, from any prior state
/// WHY: enrolled ⇒ enabled must hold for every stored combination
#[tokio::test]
async fn given_not_enabled_when_enrolling_then_false_without_driver() {
    let stored: [&[(&str, &str)]; 4] = [
        &[],
        &[(ENROLLED_KEY, "true")],
        &[(ENABLED_KEY, "false"), (ENROLLED_KEY, "true")],
        &[(ENABLED_KEY, "yes please"), (ENROLLED_KEY, "false")],
    ];

    for entries in stored {
        // Given: A gate restored from a store that does not enable biometrics
        let gate = gate(
            FakeProbe::granted(),
            FakeBiometricDriver::new(Challenge::Pass),
            FakeStore::with(entries),
        )
        .await;

        // When: Enrolling
        let enrolled = gate.controller.enroll_biometric().await;

        // Then: Refused without prompting
        assert!(!enrolled, "stored {entries:?}");
        assert_eq!(gate.driver.calls(), 0, "stored {entries:?}");
        assert!(!gate.controller.snapshot().is_enrolled(), "stored {entries:?}");
        assert_eq!(
            gate.controller.snapshot().last_failure(),
            Some(FailureKind::PreconditionNotMet)
        );
    }
}

/// WHAT: Enrolling after enabling persists the enrollment
/// WHY: Setup completion must survive restarts
#[tokio::test]
async fn given_enabled_when_enrolling_then_enrolled_and_persisted() {
    // Given: Enabled gate
    let gate = default_gate().await;
    assert!(gate.controller.enable_biometric().await);

    // When: Enrolling
    let enrolled = gate.controller.enroll_biometric().await;

    // Then: Enrolled in memory and in the store
    assert!(enrolled);
    assert!(gate.controller.snapshot().is_enrolled());
    assert_eq!(gate.store.get(ENROLLED_KEY).as_deref(), Some("true"));
    assert_eq!(gate.driver.calls(), 2);
}

/// WHAT: Disabling after a passing challenge clears both flags
/// WHY: Opt-out must fully reset enrollment
#[tokio::test]
async fn given_enrolled_when_disabling_then_both_flags_cleared_and_persisted() {
    // Given: Enabled and enrolled gate
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Pass),
        FakeStore::with(&[(ENABLED_KEY, "true"), (ENROLLED_KEY, "true")]),
    )
    .await;
    assert!(gate.controller.snapshot().is_enrolled());

    // When: Disabling
    let disabled = gate.controller.disable_biometric().await;

    // Then: Both flags off everywhere, one challenge shown
    assert!(disabled);
    let snapshot = gate.controller.snapshot();
    assert!(!snapshot.is_enabled());
    assert!(!snapshot.is_enrolled());
    assert_eq!(gate.store.get(ENABLED_KEY).as_deref(), Some("false"));
    assert_eq!(gate.store.get(ENROLLED_KEY).as_deref(), Some("false"));
    assert_eq!(gate.driver.reasons(), vec!["disable biometric login".to_string()]);
}

/// WHAT: A challenge that runs but is not passed still disables
/// WHY: Disabling is authenticated but does not block on the result
#[tokio::test]
async fn given_failed_challenge_when_disabling_then_disabled_and_true() {
    // Given: Enabled gate, user will fail the challenge
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Fail),
        FakeStore::with(&[(ENABLED_KEY, "true"), (ENROLLED_KEY, "true")]),
    )
    .await;

    // When/Then: Disable succeeds and clears both flags
    assert!(gate.controller.disable_biometric().await);
    assert!(!gate.controller.snapshot().is_enabled());
    assert!(!gate.controller.snapshot().is_enrolled());
}

/// WHAT: A platform error during the disable challenge keeps the flags
/// WHY: A transient bug must not silently turn biometric login off
#[tokio::test]
async fn given_driver_error_when_disabling_then_false_and_flags_kept() {
    // Given: Enabled and enrolled, authenticator throws
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Error),
        FakeStore::with(&[(ENABLED_KEY, "true"), (ENROLLED_KEY, "true")]),
    )
    .await;

    // When: Disabling
    let disabled = gate.controller.disable_biometric().await;

    // Then: Nothing changed
    assert!(!disabled);
    assert!(gate.controller.snapshot().is_enabled());
    assert!(gate.controller.snapshot().is_enrolled());
    assert_eq!(gate.store.get(ENABLED_KEY).as_deref(), Some("true"));
}

/// WHAT: Store failures during disable do not block the in-memory opt-out
/// WHY: The user asked to turn the feature off
#[tokio::test]
async fn given_store_failure_when_disabling_then_still_disabled_in_memory() {
    // Given: Enabled gate whose store rejects writes
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Pass),
        FakeStore::with(&[(ENABLED_KEY, "true")]),
    )
    .await;
    gate.store.fail_writes.store(true, Ordering::SeqCst);

    // When/Then: Disabled in memory
    assert!(gate.controller.disable_biometric().await);
    assert!(!gate.controller.snapshot().is_enabled());
}

/// WHAT: A second authenticate while one is in flight is rejected immediately
/// WHY: Overlapping biometric prompts are a UX and security hazard
#[tokio::test]
async fn given_in_flight_authenticate_when_second_call_then_rejected_without_driver() {
    // Given: An authenticate call held open inside the driver
    let gate = default_gate().await;
    gate.driver.hold.store(true, Ordering::SeqCst);
    let controller = Arc::new(gate.controller);
    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.authenticate("unlock session").await })
    };
    wait_until_authenticating(&controller).await;

    // When: A second caller arrives
    let second = controller.authenticate("unlock session").await;

    // Then: Rejected at once, driver invoked only once
    assert!(!second);
    assert_eq!(gate.driver.calls(), 1);
    assert_eq!(
        controller.snapshot().last_failure(),
        Some(FailureKind::ConcurrencyRejected)
    );
    assert!(controller.snapshot().is_authenticating());

    // When: The first challenge completes
    gate.driver.gate.notify_one();
    #[allow(clippy::unwrap_used)]
    let first = first.await.unwrap();

    // Then: First succeeded, flag cleared, still one driver call
    assert!(first);
    assert!(!controller.snapshot().is_authenticating());
    assert_eq!(gate.driver.calls(), 1);
}

/// WHAT: Enable is rejected while a user-initiated challenge is on screen
/// WHY: Every challenge shares the same single-flight guard
#[tokio::test]
async fn given_in_flight_authenticate_when_enabling_then_rejected() {
    // Given: An authenticate call held open
    let gate = default_gate().await;
    gate.driver.hold.store(true, Ordering::SeqCst);
    let controller = Arc::new(gate.controller);
    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.authenticate("unlock session").await })
    };
    wait_until_authenticating(&controller).await;

    // When: Enabling concurrently
    let enabled = controller.enable_biometric().await;

    // Then: Refused without a second prompt
    assert!(!enabled);
    assert_eq!(gate.driver.calls(), 1);
    gate.driver.gate.notify_one();
    #[allow(clippy::unwrap_used)]
    let _ = first.await.unwrap();
}

/// WHAT: A throwing authenticator yields false and clears the flag
/// WHY: Exceptions become false; the flag is cleared on every exit path
#[tokio::test]
async fn given_driver_error_when_authenticating_then_false_and_flag_cleared() {
    // Given: Authenticator throws
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Error),
        FakeStore::default(),
    )
    .await;

    // When: Authenticating
    let passed = gate.controller.authenticate("unlock session").await;

    // Then: false, not authenticating, failure recorded
    assert!(!passed);
    let snapshot = gate.controller.snapshot();
    assert!(!snapshot.is_authenticating());
    assert_eq!(snapshot.last_failure(), Some(FailureKind::DriverFailure));

    // When: The authenticator recovers
    gate.driver.set_outcome(Challenge::Pass);

    // Then: The next call goes through
    assert!(gate.controller.authenticate("unlock session").await);
    assert_eq!(gate.controller.snapshot().last_failure(), None);
}

/// WHAT: Dropping an in-flight authenticate releases the guard
/// WHY: A cancelled screen must not wedge the gate forever
#[tokio::test(start_paused = true)]
async fn given_in_flight_authenticate_when_future_dropped_then_guard_released() {
    // Given: Authenticator that never answers
    let gate = default_gate().await;
    gate.driver.hold.store(true, Ordering::SeqCst);

    // When: The caller gives up
    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        gate.controller.authenticate("unlock session"),
    )
    .await;

    // Then: Flag cleared, and the next challenge can run
    assert!(outcome.is_err());
    assert!(!gate.controller.snapshot().is_authenticating());
    gate.driver.hold.store(false, Ordering::SeqCst);
    assert!(gate.controller.authenticate("unlock session").await);
}

/// WHAT: Stopping authentication with nothing in flight is harmless
/// WHY: Screens call it unconditionally on teardown
#[tokio::test]
async fn given_nothing_in_flight_when_stopping_authentication_then_safe() {
    // Given: An idle gate whose cancel call throws
    let gate = default_gate().await;
    gate.driver.fail_cancel.store(true, Ordering::SeqCst);

    // When: Stopping authentication
    gate.controller.stop_authentication().await;

    // Then: Cancel was attempted, error swallowed, flag clear
    assert_eq!(gate.driver.cancel_calls.load(Ordering::SeqCst), 1);
    assert!(!gate.controller.snapshot().is_authenticating());
}

/// WHAT: Stopping an in-flight challenge clears the flag and reopens the gate
/// WHY: The UI hides the prompt overlay as soon as cancel is requested, and a
/// cleared flag must mean a new challenge is accepted
#[tokio::test]
async fn given_in_flight_authenticate_when_stopping_then_flag_cleared_and_gate_reopened() {
    // Given: An authenticate call held open
    let gate = default_gate().await;
    gate.driver.hold.store(true, Ordering::SeqCst);
    let controller = Arc::new(gate.controller);
    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.authenticate("unlock session").await })
    };
    wait_until_authenticating(&controller).await;

    // When: Stopping
    controller.stop_authentication().await;

    // Then: Flag cleared and cancel sent
    assert!(!controller.snapshot().is_authenticating());
    assert_eq!(gate.driver.cancel_calls.load(Ordering::SeqCst), 1);

    // When: A new challenge starts while the dismissed one is still unwinding
    let second = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.authenticate("unlock again").await })
    };
    wait_until_authenticating(&controller).await;
    while gate.driver.calls() < 2 {
        tokio::task::yield_now().await;
    }

    // Then: It reached the driver instead of being rejected
    assert_eq!(gate.driver.reasons(), vec!["unlock session", "unlock again"]);
    assert_eq!(controller.snapshot().last_failure(), None);

    // When: The dismissed challenge finally returns
    gate.driver.gate.notify_one();
    #[allow(clippy::unwrap_used)]
    let _ = first.await.unwrap();

    // Then: The newer challenge still holds the gate
    assert!(controller.snapshot().is_authenticating());
    assert!(!controller.authenticate("third").await);
    assert_eq!(
        controller.snapshot().last_failure(),
        Some(FailureKind::ConcurrencyRejected)
    );

    // When: The newer challenge returns
    gate.driver.gate.notify_one();
    #[allow(clippy::unwrap_used)]
    let passed = second.await.unwrap();

    // Then: Gate released
    assert!(passed);
    assert!(!controller.snapshot().is_authenticating());
    assert_eq!(gate.driver.calls(), 2);
}

/// WHAT: Clearing data deletes both keys and resets the flags
/// WHY: Account sign-out must leave no biometric opt-in behind
#[tokio::test]
async fn given_persisted_flags_when_clearing_then_deleted_and_reset() {
    // Given: Enabled and enrolled gate
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Pass),
        FakeStore::with(&[(ENABLED_KEY, "true"), (ENROLLED_KEY, "true")]),
    )
    .await;

    // When: Clearing
    gate.controller.clear_biometric_data().await;

    // Then: Keys gone, flags off, no challenge shown
    assert_eq!(gate.store.get(ENABLED_KEY), None);
    assert_eq!(gate.store.get(ENROLLED_KEY), None);
    assert!(!gate.controller.snapshot().is_enabled());
    assert!(!gate.controller.snapshot().is_enrolled());
    assert_eq!(gate.driver.calls(), 0);
}

/// WHAT: Store failures while clearing are swallowed
/// WHY: Absent data is an acceptable outcome; memory is reset regardless
#[tokio::test]
async fn given_store_delete_failure_when_clearing_then_flags_reset() {
    // Given: Enabled gate whose store rejects deletes
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Pass),
        FakeStore::with(&[(ENABLED_KEY, "true")]),
    )
    .await;
    gate.store.fail_deletes.store(true, Ordering::SeqCst);

    // When: Clearing
    gate.controller.clear_biometric_data().await;

    // Then: Both deletes attempted, memory reset
    assert_eq!(gate.store.delete_calls.load(Ordering::SeqCst), 2);
    assert!(!gate.controller.snapshot().is_enabled());
}

/// WHAT: Persisted flags are restored on construction
/// WHY: Opt-in survives process restarts
#[tokio::test]
async fn given_persisted_flags_when_constructed_then_restored() {
    // Given/When: Store holds enabled + enrolled
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Pass),
        FakeStore::with(&[(ENABLED_KEY, "true"), (ENROLLED_KEY, "true")]),
    )
    .await;

    // Then: Both restored
    let snapshot = gate.controller.snapshot();
    assert!(snapshot.is_enabled());
    assert!(snapshot.is_enrolled());
}

/// WHAT: A stored enrolled-without-enabled pair reads as not enrolled
/// WHY: The invariant is enforced on read, whatever the store holds
#[tokio::test]
async fn given_invalid_persisted_combination_when_constructed_then_not_enrolled() {
    // Given/When: Store holds enrolled but not enabled
    let gate = gate(
        FakeProbe::granted(),
        FakeBiometricDriver::new(Challenge::Pass),
        FakeStore::with(&[(ENABLED_KEY, "false"), (ENROLLED_KEY, "true")]),
    )
    .await;

    // Then: Downgraded on read
    assert!(!gate.controller.snapshot().is_enabled());
    assert!(!gate.controller.snapshot().is_enrolled());
}

/// WHAT: Unreadable storage starts the gate disabled
/// WHY: Construction never fails
#[tokio::test]
async fn given_store_read_failure_when_constructed_then_flags_false() {
    // Given: Store that fails every read
    let store = FakeStore::with(&[(ENABLED_KEY, "true")]);
    store.fail_reads.store(true, Ordering::SeqCst);

    // When: Constructing
    let gate = gate(FakeProbe::granted(), FakeBiometricDriver::new(Challenge::Pass), store).await;

    // Then: Disabled, still available
    assert!(!gate.controller.snapshot().is_enabled());
    assert!(gate.controller.snapshot().is_available());
}
