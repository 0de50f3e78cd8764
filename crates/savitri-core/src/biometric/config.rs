use std::time::Duration;

use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_ENABLE_REASON: &str = "enable biometric login";
pub(crate) const DEFAULT_ENROLL_REASON: &str = "complete biometric setup";
pub(crate) const DEFAULT_DISABLE_REASON: &str = "disable biometric login";
pub(crate) const DEFAULT_ENABLED_KEY: &str = "biometric_enabled";
pub(crate) const DEFAULT_ENROLLED_KEY: &str = "biometric_enrolled";
pub(crate) const DEFAULT_AVAILABILITY_TTL_MS: u64 = 30_000;

fn default_enable_reason() -> String {
    DEFAULT_ENABLE_REASON.to_string()
}

fn default_enroll_reason() -> String {
    DEFAULT_ENROLL_REASON.to_string()
}

fn default_disable_reason() -> String {
    DEFAULT_DISABLE_REASON.to_string()
}

fn default_enabled_key() -> String {
    DEFAULT_ENABLED_KEY.to_string()
}

fn default_enrolled_key() -> String {
    DEFAULT_ENROLLED_KEY.to_string()
}

fn default_availability_ttl_ms() -> u64 {
    DEFAULT_AVAILABILITY_TTL_MS
}

/// Settings for a [`BiometricGateController`](crate::BiometricGateController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricConfig {
    /// Justification shown by the challenge that enables biometric login.
    #[serde(default = "default_enable_reason")]
    pub enable_reason: String,

    /// Justification shown by the enrollment challenge.
    #[serde(default = "default_enroll_reason")]
    pub enroll_reason: String,

    /// Justification shown by the challenge that disables biometric login.
    #[serde(default = "default_disable_reason")]
    pub disable_reason: String,

    /// Secure store key for the "enabled" flag.
    #[serde(default = "default_enabled_key")]
    pub enabled_key: String,

    /// Secure store key for the "enrolled" flag.
    #[serde(default = "default_enrolled_key")]
    pub enrolled_key: String,

    /// How long a positive availability check stays valid, in milliseconds.
    #[serde(default = "default_availability_ttl_ms")]
    pub availability_ttl_ms: u64,
}

impl BiometricConfig {
    /// How long a positive availability check stays valid.
    pub fn availability_ttl(&self) -> Duration {
        Duration::from_millis(self.availability_ttl_ms)
    }
}

impl Default for BiometricConfig {
    fn default() -> Self {
        Self {
            enable_reason: default_enable_reason(),
            enroll_reason: default_enroll_reason(),
            disable_reason: default_disable_reason(),
            enabled_key: default_enabled_key(),
            enrolled_key: default_enrolled_key(),
            availability_ttl_ms: DEFAULT_AVAILABILITY_TTL_MS,
        }
    }
}
