use async_trait::async_trait;
use keyring::Entry;
use savitri_core::{CoreError, CoreResult, SecureStore};
use tracing::debug;

/// Secure store on the OS credential manager.
///
/// Each key becomes one keyring entry under the configured service name.
/// Keyring calls block, so they run on the blocking pool.
pub(crate) struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub(crate) fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Entry) -> keyring::Result<T> + Send + 'static,
    {
        let service = self.service.clone();
        let user = key.to_string();

        let outcome = tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &user)?;
            op(&entry)
        })
        .await
        .map_err(|e| CoreError::store(key, e))?;

        outcome.map_err(|e| CoreError::store(key, e))
    }
}

#[async_trait]
impl SecureStore for KeyringStore {
    async fn read(&self, key: &str) -> CoreResult<Option<String>> {
        let value = self
            .with_entry(key, |entry| match entry.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e),
            })
            .await?;

        if value.is_none() {
            debug!(key, "No keychain entry found");
        }
        Ok(value)
    }

    async fn write(&self, key: &str, value: &str) -> CoreResult<()> {
        let value = value.to_string();
        self.with_entry(key, move |entry| entry.set_password(&value))
            .await
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}
