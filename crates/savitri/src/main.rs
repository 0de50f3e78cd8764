//! Savitri: console host for the recording session and biometric gate
//! controllers, wired to the desktop microphone and credential store.

mod app;
mod app_command;
mod config;
mod error;
mod platform;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    error::{AppError, Result as AppResult},
};

use crate::{
    config::{Config, DEFAULT_LOG_FILTER, LoggingConfig},
    platform::{CpalAudioDriver, DesktopProbe, KeyringStore, PromptAuthenticator},
};

use std::{fs, sync::Arc, time::Duration};

use savitri_core::{BiometricGateController, RecordingSessionController};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for blocking work such as a pending stdin read.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the collaborators and controllers, then hand them to the console.
async fn run(config: Config) -> AppResult<()> {
    fs::create_dir_all(&config.recording.output_dir)?;

    let (authenticator, prompt_rx) = PromptAuthenticator::new();
    let authenticator = Arc::new(authenticator);
    let probe = Arc::new(DesktopProbe::new(config.security.prompt_authenticator));
    let audio = Arc::new(CpalAudioDriver::spawn()?);
    let store = Arc::new(KeyringStore::new(config.security.keyring_service.clone()));

    let recording = Arc::new(RecordingSessionController::new(
        probe.clone(),
        audio,
        config.recording.clone(),
    ));
    let biometric = Arc::new(
        BiometricGateController::new(
            probe,
            authenticator.clone(),
            store,
            config.biometric.clone(),
        )
        .await,
    );

    info!(
        output_dir = ?config.recording.output_dir,
        prompt_authenticator = config.security.prompt_authenticator,
        "Controllers ready"
    );

    App::new(recording, biometric, authenticator, prompt_rx)
        .run()
        .await
}

/// Application entry point.
fn main() {
    let config = Config::load();

    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Config validation failed: {:?}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(run(config));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    if let Err(e) = outcome {
        error!(error = ?e, "App error");
        std::process::exit(1);
    }
}
