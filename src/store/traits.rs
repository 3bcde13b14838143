//! Key-Value Store Contract
//!
//! Async trait implemented by every store the cache can write through.
//! Modeled on host stores that bound value sizes and key counts, expose key
//! enumeration but no queries, and report ordinary rejections (quota, size)
//! as `false` rather than as errors.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Key-Value Store Trait ==
/// Asynchronous key-value store with enumerable keys.
///
/// Values are UTF-8 strings (the cache persists JSON records). A `set`
/// returning `Ok(false)` means the store rejected the value without failing
/// (typically a per-value size ceiling); `Err` is reserved for transport
/// failures.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`. Returns `false` if the store rejected
    /// the write (size ceiling, quota) without failing.
    async fn set(&self, key: &str, value: &str) -> StoreResult<bool>;

    /// Batched read. Absent keys are simply missing from the result map.
    async fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, String>>;

    /// Removes `key`. Returns `false` if it was not present.
    async fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Best-effort batched removal; keys that fail to remove are skipped.
    async fn remove_many(&self, keys: &[String]) -> StoreResult<()>;

    /// Enumerates every key currently in the store.
    async fn list_keys(&self) -> StoreResult<Vec<String>>;

    /// Cheap availability probe, checked before each public cache operation.
    fn is_available(&self) -> bool {
        true
    }
}
