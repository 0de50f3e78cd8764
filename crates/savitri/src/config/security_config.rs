use crate::config::{default_keyring_service, default_prompt_authenticator};

use serde::{Deserialize, Serialize};

/// Credential store and authenticator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Service name the biometric flags are stored under in the OS keyring.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,

    /// Use the console approve/deny challenge as the biometric authenticator.
    /// When off, the device reports no biometric support.
    #[serde(default = "default_prompt_authenticator")]
    pub prompt_authenticator: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            keyring_service: default_keyring_service(),
            prompt_authenticator: default_prompt_authenticator(),
        }
    }
}
