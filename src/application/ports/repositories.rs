use async_trait::async_trait;
use anyhow::Result;

/// Key-value store shared by every handler.
///
/// `compare_and_set` is the only atomic operation; `expected == None` means
/// "write only if the key is absent".
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by key, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Unconditionally write a value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a key; deleting an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Write `new` only if the stored value equals `expected`.
    /// Returns whether the swap happened.
    async fn compare_and_set(&self, key: &str, expected: Option<&[u8]>, new: &[u8]) -> Result<bool>;
}
