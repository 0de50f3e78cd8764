//! Configuration management for savitri.
//!
//! Handles loading and saving TOML configuration files with cross-platform
//! paths, explicit validation, and atomic write operations.

use crate::{
    AppError, AppResult,
    config::{LoggingConfig, SecurityConfig, default_recording, project_dirs},
};

use std::{
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
};

use error_location::ErrorLocation;
use savitri_core::{BiometricConfig, RecordingConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Main configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Recording session settings.
    #[serde(default = "default_recording")]
    pub recording: RecordingConfig,
    /// Biometric gate settings.
    #[serde(default)]
    pub biometric: BiometricConfig,
    /// Credential store and authenticator settings.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recording: default_recording(),
            biometric: BiometricConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from disk, creating default if not found.
    ///
    /// Does NOT validate. Call [`validate`](Self::validate) before building
    /// controllers from it.
    #[track_caller]
    #[instrument]
    pub fn load() -> AppResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            info!("No config found, creating default");
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load and parse the configuration at `path`.
    #[track_caller]
    #[instrument]
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to read config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(config_path = ?path, "Configuration loaded");

        Ok(config)
    }

    /// Check the values the controllers and the desktop driver rely on.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn validate(&self) -> AppResult<()> {
        let recording = &self.recording;

        let problem = if recording.amplitude_interval_ms == 0 {
            Some("recording.amplitude_interval_ms must be greater than 0".to_string())
        } else if !(recording.amplitude_floor_db.is_finite() && recording.amplitude_floor_db > 0.0)
        {
            Some(format!(
                "recording.amplitude_floor_db must be a positive number, got {}",
                recording.amplitude_floor_db
            ))
        } else if recording.container_extension.trim().is_empty() {
            Some("recording.container_extension must not be empty".to_string())
        } else if recording.file_prefix.trim().is_empty() {
            Some("recording.file_prefix must not be empty".to_string())
        } else if recording.chunk_buffer == 0 {
            Some("recording.chunk_buffer must be greater than 0".to_string())
        } else if recording.capture.sample_rate == 0 {
            Some("recording.capture.sample_rate must be greater than 0".to_string())
        } else if recording.capture.channels != 1 || recording.capture.bits_per_sample != 16 {
            Some(format!(
                "the desktop recorder writes 16-bit mono, got {} channel(s) at {} bits",
                recording.capture.channels, recording.capture.bits_per_sample
            ))
        } else if self.security.keyring_service.trim().is_empty() {
            Some("security.keyring_service must not be empty".to_string())
        } else {
            None
        };

        match problem {
            Some(reason) => Err(AppError::ConfigError {
                reason,
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Ok(()),
        }
    }

    /// Write to a temporary file first, then rename over `path` so a crash
    /// mid-write never leaves a truncated config behind.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let temp_path = path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to create temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::ConfigError {
                reason: format!("Failed to write temp config file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        temp_file.sync_all().map_err(|e| AppError::ConfigError {
            reason: format!("Failed to sync temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::rename(&temp_path, path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to rename temp config to final: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(config_path = ?path, "Configuration saved (atomic write)");

        Ok(())
    }

    #[track_caller]
    fn config_path() -> AppResult<PathBuf> {
        let proj_dirs = project_dirs().ok_or_else(|| AppError::ConfigError {
            reason: "Failed to get config directory".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let config_dir = proj_dirs.config_dir();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            debug!(config_dir = ?config_dir, "Created config directory");
        }

        Ok(config_dir.join("config.toml"))
    }
}
