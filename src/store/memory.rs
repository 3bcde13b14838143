//! In-Memory Store
//!
//! Map-backed [`KeyValueStore`] implementation. Unconstrained by default,
//! which makes it suitable as the fallback store; the constraint and fault
//! knobs let tests model the primary store's size ceiling, outages, and
//! per-key failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::traits::{KeyValueStore, StoreResult};

// == In-Memory Store ==
/// Key-value store backed by a map behind a tokio `RwLock`.
#[derive(Debug)]
pub struct InMemoryStore {
    /// Key-value storage
    entries: RwLock<HashMap<String, String>>,
    /// Per-value byte ceiling; `set` returns false above it
    max_value_size: Option<usize>,
    /// Availability flag, toggleable to exercise the fallback path
    available: AtomicBool,
    /// Keys whose reads fail with a backend error
    failing_gets: RwLock<HashSet<String>>,
    /// Keys whose writes fail with a backend error
    failing_sets: RwLock<HashSet<String>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    // == Constructor ==
    /// Creates an empty, unconstrained, available store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_value_size: None,
            available: AtomicBool::new(true),
            failing_gets: RwLock::new(HashSet::new()),
            failing_sets: RwLock::new(HashSet::new()),
        }
    }

    /// Creates a store that rejects values longer than `max_value_size` bytes,
    /// mirroring the host stores chunking exists for.
    pub fn with_max_value_size(max_value_size: usize) -> Self {
        Self {
            max_value_size: Some(max_value_size),
            ..Self::new()
        }
    }

    // == Test Knobs ==
    /// Flips the availability probe.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes subsequent reads of `key` fail with a backend error.
    pub async fn fail_gets_for(&self, key: &str) {
        self.failing_gets.write().await.insert(key.to_string());
    }

    /// Makes subsequent writes of `key` fail with a backend error.
    pub async fn fail_sets_for(&self, key: &str) {
        self.failing_sets.write().await.insert(key.to_string());
    }

    // == Length ==
    /// Returns the current number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if self.failing_gets.read().await.contains(key) {
            return Err(StoreError::Backend(format!("injected get failure: {key}")));
        }
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<bool> {
        if self.failing_sets.read().await.contains(key) {
            return Err(StoreError::Backend(format!("injected set failure: {key}")));
        }
        if let Some(ceiling) = self.max_value_size {
            if value.len() > ceiling {
                return Ok(false);
            }
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, String>> {
        let failing = self.failing_gets.read().await;
        let entries = self.entries.read().await;
        let mut found = HashMap::new();
        for key in keys {
            // A failing key is dropped from the batch result rather than
            // failing the whole batch, matching host batched-read semantics.
            if failing.contains(key) {
                continue;
            }
            if let Some(value) = entries.get(key) {
                found.insert(key.clone(), value.clone());
            }
        }
        Ok(found)
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn remove_many(&self, keys: &[String]) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
