mod config;
mod controller;
mod display;
mod state;

pub use {
    config::BiometricConfig, controller::BiometricGateController, display::BiometricIcon,
    state::BiometricSnapshot,
};
