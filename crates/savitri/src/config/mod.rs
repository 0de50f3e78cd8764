#[allow(clippy::module_inception)]
mod config;
mod logging_config;
mod security_config;

pub(crate) use {
    config::Config, logging_config::LoggingConfig, security_config::SecurityConfig,
};

use directories::ProjectDirs;
use savitri_core::RecordingConfig;

pub(crate) const DEFAULT_KEYRING_SERVICE: &str = "com.savitri.app";
pub(crate) const DEFAULT_PROMPT_AUTHENTICATOR: bool = true;
pub(crate) const DEFAULT_LOG_FILTER: &str = "savitri=info,savitri_core=info";

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "savitri", "Savitri")
}

pub(crate) fn default_recording() -> RecordingConfig {
    match project_dirs() {
        Some(dirs) => RecordingConfig::new(dirs.data_dir().join("recordings")),
        None => RecordingConfig::default(),
    }
}

pub(crate) fn default_keyring_service() -> String {
    DEFAULT_KEYRING_SERVICE.to_string()
}

pub(crate) fn default_prompt_authenticator() -> bool {
    DEFAULT_PROMPT_AUTHENTICATOR
}

pub(crate) fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
