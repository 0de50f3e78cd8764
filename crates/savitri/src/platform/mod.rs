//! Desktop implementations of the core collaborator traits.

mod cpal_driver;
mod desktop_probe;
mod keyring_store;
mod prompt_authenticator;

pub(crate) use {
    cpal_driver::CpalAudioDriver,
    desktop_probe::DesktopProbe,
    keyring_store::KeyringStore,
    prompt_authenticator::{Prompt, PromptAuthenticator},
};

#[cfg(test)]
pub(crate) use cpal_driver::{downmix, peak_dbfs};
