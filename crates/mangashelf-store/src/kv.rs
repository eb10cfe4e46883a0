//! Key-value persistence contract.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::KvResult;

/// Asynchronous string key-value store backing every collection.
///
/// Implementations must be safe to share across tasks. Every operation may
/// fail; callers decide whether a failure is fatal.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a single value.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Insert or overwrite a single value.
    async fn set(&self, key: &str, value: &str) -> KvResult<()>;

    /// Fetch many values, preserving the order of `keys`. Missing keys yield
    /// `None`.
    async fn multi_get(&self, keys: &[String]) -> KvResult<Vec<(String, Option<String>)>>;

    /// Insert or overwrite many values atomically where the backend allows it.
    async fn multi_set(&self, entries: &[(String, String)]) -> KvResult<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> KvResult<()>;

    /// Remove every value.
    async fn clear(&self) -> KvResult<()>;
}

/// Process-local backend used for ephemeral runs and tests.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with raw records.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    /// Sorted list of stored keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> KvResult<Vec<(String, Option<String>)>> {
        let entries = self.lock();
        Ok(keys
            .iter()
            .map(|key| (key.clone(), entries.get(key).cloned()))
            .collect())
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> KvResult<()> {
        let mut stored = self.lock();
        for (key, value) in entries {
            stored.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> KvResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> KvResult<()> {
        self.lock().clear();
        Ok(())
    }
}
