use std::sync::Arc;

use crate::application::ports::KvStore;
use crate::error::{BridgeError, Result};
use crate::infrastructure::logging::{BoundaryLogger, Timer};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// KvMutator - optimistic read-modify-write over a KvStore
///
/// Shared aggregate values (`subscriptions`, `vcs_list`) must only be written
/// through [`KvMutator::atomic_modify`]. Plain reads and single-entity writes
/// go through the logged helpers next to it.
pub struct KvMutator<S>
where
    S: KvStore + ?Sized,
{
    store: Arc<S>,
    max_attempts: u32,
    logger: Arc<BoundaryLogger>,
}

impl<S> KvMutator<S>
where
    S: KvStore + ?Sized,
{
    pub fn new(store: Arc<S>, max_attempts: u32, logger: Arc<BoundaryLogger>) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            logger,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Read `key`, apply `transform`, compare-and-set, and on a lost race
    /// re-read and try again, at most `max_attempts` swaps in total.
    ///
    /// `transform` receives `None` when the key is absent. Its errors abort
    /// immediately without touching the store.
    pub async fn atomic_modify<F>(&self, trace_id: &str, caller: &str, key: &str, mut transform: F) -> Result<()>
    where
        F: FnMut(Option<&[u8]>) -> Result<Vec<u8>> + Send,
    {
        let mut current = self.get(trace_id, caller, key).await?;

        for attempt in 1..=self.max_attempts {
            let new = transform(current.as_deref())?;

            self.logger.repo_call(trace_id, caller, "KvStore", "compare_and_set", key);
            let timer = Timer::start();
            let swapped = self
                .store
                .compare_and_set(key, current.as_deref(), &new)
                .await
                .map_err(|e| {
                    self.logger.repo_error(trace_id, caller, "KvStore", "compare_and_set", key, &e);
                    BridgeError::store("compare_and_set", key, e)
                })?;
            self.logger.repo_done(trace_id, caller, "KvStore", "compare_and_set", timer.elapsed_ms());

            if swapped {
                return Ok(());
            }

            self.logger.repo_conflict(trace_id, caller, key, attempt, self.max_attempts);
            if attempt < self.max_attempts {
                current = self.get(trace_id, caller, key).await?;
            }
        }

        Err(BridgeError::RetryExhausted {
            key: key.to_string(),
            attempts: self.max_attempts,
        })
    }

    pub async fn get(&self, trace_id: &str, caller: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.logger.repo_call(trace_id, caller, "KvStore", "get", key);
        let timer = Timer::start();
        let value = self.store.get(key).await.map_err(|e| {
            self.logger.repo_error(trace_id, caller, "KvStore", "get", key, &e);
            BridgeError::store("get", key, e)
        })?;
        self.logger.repo_done(trace_id, caller, "KvStore", "get", timer.elapsed_ms());
        Ok(value)
    }

    /// Unconditional write, only for values owned by a single entity
    pub async fn set(&self, trace_id: &str, caller: &str, key: &str, value: &[u8]) -> Result<()> {
        self.logger.repo_call(trace_id, caller, "KvStore", "set", key);
        let timer = Timer::start();
        self.store.set(key, value).await.map_err(|e| {
            self.logger.repo_error(trace_id, caller, "KvStore", "set", key, &e);
            BridgeError::store("set", key, e)
        })?;
        self.logger.repo_done(trace_id, caller, "KvStore", "set", timer.elapsed_ms());
        Ok(())
    }

    /// Returns false when the key already exists
    pub async fn insert_if_absent(&self, trace_id: &str, caller: &str, key: &str, value: &[u8]) -> Result<bool> {
        self.logger.repo_call(trace_id, caller, "KvStore", "compare_and_set", key);
        let timer = Timer::start();
        let inserted = self.store.compare_and_set(key, None, value).await.map_err(|e| {
            self.logger.repo_error(trace_id, caller, "KvStore", "compare_and_set", key, &e);
            BridgeError::store("compare_and_set", key, e)
        })?;
        self.logger.repo_done(trace_id, caller, "KvStore", "compare_and_set", timer.elapsed_ms());
        Ok(inserted)
    }

    pub async fn delete(&self, trace_id: &str, caller: &str, key: &str) -> Result<()> {
        self.logger.repo_call(trace_id, caller, "KvStore", "delete", key);
        let timer = Timer::start();
        self.store.delete(key).await.map_err(|e| {
            self.logger.repo_error(trace_id, caller, "KvStore", "delete", key, &e);
            BridgeError::store("delete", key, e)
        })?;
        self.logger.repo_done(trace_id, caller, "KvStore", "delete", timer.elapsed_ms());
        Ok(())
    }
}
