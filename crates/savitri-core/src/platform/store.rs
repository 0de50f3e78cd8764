use crate::CoreResult;

use async_trait::async_trait;

/// Durable string key-value store backed by the platform's secure storage.
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key is absent.
    async fn read(&self, key: &str) -> CoreResult<Option<String>>;

    /// Write or overwrite a value.
    async fn write(&self, key: &str, value: &str) -> CoreResult<()>;

    /// Delete a key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> CoreResult<()>;
}
