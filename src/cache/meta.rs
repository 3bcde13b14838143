//! Collection Metadata Module
//!
//! The collection record is the authoritative pointer for one owner's cached
//! collection: either the whole collection embedded directly (small
//! collections, one key) or a descriptor naming the chunk generation to
//! assemble. [`MetadataStore`] reads and writes that record; a corrupt
//! record is a cache miss, never a caller-visible error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::keys::KeyScheme;
use crate::store::KeyValueStore;

// == Collection Record ==
/// Persisted record under the owner's collection key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CollectionRecord<T> {
    /// Whole collection embedded in this single value
    Direct {
        /// Unix milliseconds at write time
        timestamp: u64,
        items: Vec<T>,
    },
    /// Pointer to a chunk generation stored under separate keys
    Chunked {
        /// Unix milliseconds at write time; chunks carry the same stamp
        timestamp: u64,
        item_count: usize,
        total_chunks: u32,
        /// Generation tag baked into every chunk key of this entry
        version: u64,
    },
}

impl<T> CollectionRecord<T> {
    /// Write timestamp in Unix milliseconds.
    pub fn timestamp(&self) -> u64 {
        match self {
            CollectionRecord::Direct { timestamp, .. } => *timestamp,
            CollectionRecord::Chunked { timestamp, .. } => *timestamp,
        }
    }

    /// Whether the entry has outlived its TTL at time `now_ms`.
    ///
    /// An entry is valid strictly while `now - timestamp < ttl`; at exactly
    /// the TTL boundary it is expired.
    pub fn is_expired(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp()) >= ttl_ms
    }

    /// Version the next chunked generation for this owner should use.
    pub fn next_version(&self) -> u64 {
        match self {
            CollectionRecord::Direct { .. } => 1,
            CollectionRecord::Chunked { version, .. } => version + 1,
        }
    }
}

// == Metadata Store ==
/// Reads, writes, and invalidates collection records.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    keys: KeyScheme,
}

impl MetadataStore {
    // == Constructor ==
    pub fn new(keys: KeyScheme) -> Self {
        Self { keys }
    }

    // == Write ==
    /// Serializes the record under the owner's collection key.
    ///
    /// Returns whether the store accepted the write; failures are logged,
    /// not escalated.
    pub async fn write<T: Serialize>(
        &self,
        store: &dyn KeyValueStore,
        owner: &str,
        record: &CollectionRecord<T>,
    ) -> bool {
        let key = self.keys.collection_key(owner);
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(err) => {
                warn!(owner, %err, "failed to serialize collection record");
                return false;
            }
        };
        match store.set(&key, &value).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(owner, key, "store rejected collection record write");
                false
            }
            Err(err) => {
                warn!(owner, key, %err, "collection record write failed");
                false
            }
        }
    }

    // == Read ==
    /// Returns the owner's collection record, or `None` on a miss.
    ///
    /// A value that fails to deserialize is proactively removed and read
    /// as a miss.
    pub async fn read<T: DeserializeOwned>(
        &self,
        store: &dyn KeyValueStore,
        owner: &str,
    ) -> Option<CollectionRecord<T>> {
        let key = self.keys.collection_key(owner);
        let value = match store.get(&key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(err) => {
                warn!(owner, key, %err, "collection record read failed");
                return None;
            }
        };
        match serde_json::from_str(&value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(owner, key, %err, "corrupt collection record, dropping");
                if let Err(err) = store.remove(&key).await {
                    debug!(key, %err, "failed to drop corrupt collection record");
                }
                None
            }
        }
    }

    // == Invalidate ==
    /// Removes the collection key. Chunk keys are the controller's job.
    pub async fn invalidate(&self, store: &dyn KeyValueStore, owner: &str) {
        let key = self.keys.collection_key(owner);
        if let Err(err) = store.remove(&key).await {
            warn!(owner, key, %err, "collection record removal failed");
        }
    }
}
