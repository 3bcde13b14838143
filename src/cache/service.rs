//! Cache Service Module
//!
//! The public controller tying the pieces together: direct-vs-chunked size
//! class, versioned two-phase publish, concurrency-limited batched store
//! traffic, TTL checks on read, fallback degradation, and opportunistic
//! eviction after writes.
//!
//! Storage failures never escape these operations; a broken cache reads as
//! a miss and callers refetch from the source of truth. The only returned
//! error is the programmer-error class (empty owner key).

use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::chunk::{self, Chunk, ChunkRecord};
use crate::cache::eviction::EvictionManager;
use crate::cache::keys::{CacheKey, KeyScheme};
use crate::cache::meta::{CollectionRecord, MetadataStore};
use crate::cache::stats::{CacheStats, CacheStatsSnapshot};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::store::KeyValueStore;

// == Cache Read ==
/// Outcome of a successful cache lookup.
///
/// A chunked entry with unreadable chunks is surfaced as `Partial` rather
/// than silently returning fewer items than the entry advertises; callers
/// that need exact counts or ordering should treat `Partial` as a miss.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead<T> {
    /// Every item of the cached collection, in original order
    Complete(Vec<T>),
    /// Collection with holes: one or more chunks could not be read
    Partial {
        /// The items that were recovered, in original order
        items: Vec<T>,
        /// Indices of the chunks that failed to load
        missing_chunks: Vec<u32>,
    },
}

impl<T> CacheRead<T> {
    /// Recovered items regardless of completeness.
    pub fn items(&self) -> &[T] {
        match self {
            CacheRead::Complete(items) => items,
            CacheRead::Partial { items, .. } => items,
        }
    }

    /// True if no chunk was lost.
    pub fn is_complete(&self) -> bool {
        matches!(self, CacheRead::Complete(_))
    }

    /// Unwraps the items only when the read was complete.
    pub fn into_complete(self) -> Option<Vec<T>> {
        match self {
            CacheRead::Complete(items) => Some(items),
            CacheRead::Partial { .. } => None,
        }
    }
}

// == Cache Service ==
/// Client-side cache for one collection type over a constrained key-value
/// store, with an unconstrained local fallback.
///
/// Constructed explicitly from configuration and injected collaborators;
/// there is no global instance.
pub struct CacheService<T> {
    config: CacheConfig,
    keys: KeyScheme,
    meta: MetadataStore,
    eviction: EvictionManager,
    primary: Arc<dyn KeyValueStore>,
    fallback: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
    cancel: CancellationToken,
    _items: PhantomData<fn() -> T>,
}

impl<T> CacheService<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    // == Constructor ==
    /// Creates a service over the given primary and fallback stores, using
    /// wall-clock time.
    pub fn new(
        config: CacheConfig,
        primary: Arc<dyn KeyValueStore>,
        fallback: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_clock(config, primary, fallback, Arc::new(SystemClock))
    }

    /// Creates a service with an injected time source.
    pub fn with_clock(
        config: CacheConfig,
        primary: Arc<dyn KeyValueStore>,
        fallback: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let keys = KeyScheme::new(&config.namespace);
        let meta = MetadataStore::new(keys.clone());
        let eviction = EvictionManager::new(keys.clone(), config.max_entries);
        Self {
            config,
            keys,
            meta,
            eviction,
            primary,
            fallback,
            clock,
            stats: CacheStats::new(),
            cancel: CancellationToken::new(),
            _items: PhantomData,
        }
    }

    /// Attaches a cancellation token, checked between store batches. A
    /// cancelled write stops before publishing, leaving the previous
    /// generation authoritative.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    // == Cache ==
    /// Stores `items` as the owner's cached collection.
    ///
    /// Fire-and-forget semantics: storage failures are logged and recovered,
    /// never returned. Small collections go whole under a single key; larger
    /// ones are split into chunks written under a fresh generation version,
    /// and the collection record is published only once every chunk write
    /// succeeded. Afterwards the resident set is reconciled against the
    /// configured budget.
    pub async fn cache(&self, owner: &str, items: &[T]) -> Result<()> {
        Self::validate_owner(owner)?;
        let now = self.clock.now_ms();

        if !self.primary.is_available() {
            warn!(owner, "primary store unavailable, caching to fallback");
            let record = CollectionRecord::Direct {
                timestamp: now,
                items: items.to_vec(),
            };
            self.meta.write(self.fallback.as_ref(), owner, &record).await;
            return Ok(());
        }

        let store = self.primary.as_ref();
        let previous = self.meta.read::<T>(store, owner).await;

        if items.len() < self.config.direct_mode_threshold {
            self.cache_direct(store, owner, items, now, &previous).await;
        } else {
            self.cache_chunked(store, owner, items, now, &previous).await;
        }

        let evicted = self.eviction.reconcile(store).await;
        self.stats.record_evictions(evicted as u64);
        Ok(())
    }

    /// Direct mode: the whole collection in one value.
    async fn cache_direct(
        &self,
        store: &dyn KeyValueStore,
        owner: &str,
        items: &[T],
        now: u64,
        previous: &Option<CollectionRecord<T>>,
    ) {
        let record = CollectionRecord::Direct {
            timestamp: now,
            items: items.to_vec(),
        };
        if self.meta.write(store, owner, &record).await {
            debug!(owner, items = items.len(), "published direct collection");
            // The record replaced a chunked descriptor in place; its chunk
            // generation is now unreachable.
            if let Some(CollectionRecord::Chunked {
                total_chunks,
                version,
                ..
            }) = previous
            {
                self.collect_generation(store, owner, *version, *total_chunks)
                    .await;
            }
        }
    }

    /// Chunked mode: write the new generation, then publish the pointer.
    async fn cache_chunked(
        &self,
        store: &dyn KeyValueStore,
        owner: &str,
        items: &[T],
        now: u64,
        previous: &Option<CollectionRecord<T>>,
    ) {
        let version = previous
            .as_ref()
            .map(CollectionRecord::next_version)
            .unwrap_or(1);
        let chunks = chunk::split(items, self.config.chunk_size);
        let total_chunks = chunks.len() as u32;

        if !self.write_chunks(store, owner, chunks, version, now).await {
            warn!(
                owner,
                version, "chunk generation incomplete, keeping previous generation"
            );
            self.collect_generation(store, owner, version, total_chunks)
                .await;
            return;
        }

        let record = CollectionRecord::<T>::Chunked {
            timestamp: now,
            item_count: items.len(),
            total_chunks,
            version,
        };
        if !self.meta.write(store, owner, &record).await {
            self.collect_generation(store, owner, version, total_chunks)
                .await;
            return;
        }
        info!(owner, version, total_chunks, "published chunked collection");

        if let Some(CollectionRecord::Chunked {
            total_chunks: previous_total,
            version: previous_version,
            ..
        }) = previous
        {
            self.collect_generation(store, owner, *previous_version, *previous_total)
                .await;
        }
    }

    /// Writes chunk records in concurrency-limited batches. Returns whether
    /// every write succeeded; individual failures are logged and do not stop
    /// sibling writes or later batches.
    async fn write_chunks(
        &self,
        store: &dyn KeyValueStore,
        owner: &str,
        chunks: Vec<Chunk<T>>,
        version: u64,
        timestamp: u64,
    ) -> bool {
        let mut all_ok = true;
        let mut remaining = chunks;

        while !remaining.is_empty() {
            let batch: Vec<Chunk<T>> = remaining
                .drain(..self.config.batch_size.min(remaining.len()))
                .collect();

            let writes = batch.into_iter().map(|piece| {
                let key = self.keys.chunk_key(owner, version, piece.index);
                let record = ChunkRecord::from_chunk(piece, version, timestamp);
                async move {
                    let value = match serde_json::to_string(&record) {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(key, %err, "failed to serialize chunk");
                            return false;
                        }
                    };
                    match store.set(&key, &value).await {
                        Ok(true) => true,
                        Ok(false) => {
                            warn!(key, "store rejected chunk write");
                            false
                        }
                        Err(err) => {
                            warn!(key, %err, "chunk write failed");
                            false
                        }
                    }
                }
            });
            if join_all(writes).await.contains(&false) {
                all_ok = false;
            }

            if !remaining.is_empty() && !self.pause_between_batches().await {
                warn!(owner, version, "chunk write cancelled between batches");
                return false;
            }
        }
        all_ok
    }

    /// Best-effort removal of one chunk generation's keys.
    async fn collect_generation(
        &self,
        store: &dyn KeyValueStore,
        owner: &str,
        version: u64,
        total_chunks: u32,
    ) {
        if total_chunks == 0 {
            return;
        }
        let keys = self.keys.chunk_keys(owner, version, total_chunks);
        match store.remove_many(&keys).await {
            Ok(()) => debug!(owner, version, total_chunks, "collected chunk generation"),
            Err(err) => warn!(owner, version, %err, "chunk generation cleanup failed"),
        }
    }

    // == Get Cached ==
    /// Returns the owner's cached collection, or `None` on a miss.
    ///
    /// `None` always means "fetch fresh from the source of truth" — absent,
    /// expired, and corrupt entries all land here. A chunked entry with
    /// unreadable chunks comes back as [`CacheRead::Partial`].
    pub async fn get_cached(&self, owner: &str) -> Result<Option<CacheRead<T>>> {
        Self::validate_owner(owner)?;
        let store = self.active_store();

        let Some(record) = self.meta.read::<T>(store, owner).await else {
            self.stats.record_miss();
            return Ok(None);
        };

        let now = self.clock.now_ms();
        if record.is_expired(now, self.config.ttl_ms()) {
            debug!(owner, "cached collection expired, invalidating");
            self.remove_owner_keys(store, owner).await;
            self.stats.record_miss();
            return Ok(None);
        }

        match record {
            CollectionRecord::Direct { items, .. } => {
                self.stats.record_hit();
                Ok(Some(CacheRead::Complete(items)))
            }
            CollectionRecord::Chunked {
                item_count,
                total_chunks,
                version,
                ..
            } => {
                let (chunks, missing_chunks) =
                    self.read_chunks(store, owner, version, total_chunks).await;
                let items = chunk::reconstruct(chunks);

                if missing_chunks.is_empty() {
                    if items.len() != item_count {
                        warn!(
                            owner,
                            expected = item_count,
                            actual = items.len(),
                            "reconstructed count disagrees with descriptor"
                        );
                    }
                    self.stats.record_hit();
                    Ok(Some(CacheRead::Complete(items)))
                } else {
                    warn!(owner, ?missing_chunks, "chunked collection incomplete");
                    self.stats.record_miss();
                    Ok(Some(CacheRead::Partial {
                        items,
                        missing_chunks,
                    }))
                }
            }
        }
    }

    /// Fetches one generation's chunks in concurrency-limited batches.
    /// Returns the readable chunks plus the indices that failed; a failed
    /// chunk never fails the read.
    async fn read_chunks(
        &self,
        store: &dyn KeyValueStore,
        owner: &str,
        version: u64,
        total_chunks: u32,
    ) -> (Vec<Chunk<T>>, Vec<u32>) {
        let all_keys = self.keys.chunk_keys(owner, version, total_chunks);
        let mut chunks = Vec::with_capacity(all_keys.len());
        let mut missing = Vec::new();

        for batch_start in (0..all_keys.len()).step_by(self.config.batch_size) {
            if batch_start > 0 && !self.pause_between_batches().await {
                warn!(owner, "chunk read cancelled between batches");
                missing.extend((batch_start..all_keys.len()).map(|index| index as u32));
                break;
            }

            let batch_end = (batch_start + self.config.batch_size).min(all_keys.len());
            let batch = &all_keys[batch_start..batch_end];
            let values = match store.get_many(batch).await {
                Ok(values) => values,
                Err(err) => {
                    warn!(owner, %err, "chunk batch read failed");
                    missing.extend((batch_start..batch_end).map(|index| index as u32));
                    continue;
                }
            };

            for (offset, key) in batch.iter().enumerate() {
                let index = (batch_start + offset) as u32;
                let Some(value) = values.get(key) else {
                    missing.push(index);
                    continue;
                };
                match serde_json::from_str::<ChunkRecord<T>>(value) {
                    Ok(record) => chunks.push(Chunk {
                        index: record.index,
                        total: record.total,
                        items: record.items,
                    }),
                    Err(err) => {
                        warn!(key, %err, "corrupt chunk, dropping");
                        if let Err(err) = store.remove(key).await {
                            debug!(key, %err, "failed to drop corrupt chunk");
                        }
                        missing.push(index);
                    }
                }
            }
        }
        (chunks, missing)
    }

    // == Clear ==
    /// Removes the owner's collection record and every chunk key, in both
    /// the primary and fallback stores. Best-effort; individual removal
    /// failures are swallowed and logged.
    pub async fn clear(&self, owner: &str) -> Result<()> {
        Self::validate_owner(owner)?;
        if self.primary.is_available() {
            self.remove_owner_keys(self.primary.as_ref(), owner).await;
        }
        self.remove_owner_keys(self.fallback.as_ref(), owner).await;
        Ok(())
    }

    /// Removes every key under the namespace belonging to `owner`,
    /// regardless of generation.
    async fn remove_owner_keys(&self, store: &dyn KeyValueStore, owner: &str) {
        let all_keys = match store.list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(owner, %err, "key listing failed, skipping removal");
                return;
            }
        };
        let mine: Vec<String> = all_keys
            .into_iter()
            .filter(|key| {
                self.keys
                    .classify(key)
                    .is_some_and(|classified| classified.owner() == owner)
            })
            .collect();
        if mine.is_empty() {
            return;
        }
        if let Err(err) = store.remove_many(&mine).await {
            warn!(owner, %err, "owner key removal failed");
        }
    }

    // == Stats ==
    /// Point-in-time statistics. Descriptive only; the size figure is the
    /// sum of stored value lengths with no correctness guarantee.
    pub async fn stats(&self) -> CacheStatsSnapshot {
        let store = self.active_store();
        let all_keys = match store.list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%err, "key listing failed, reporting empty store");
                return self.stats.snapshot(0, 0);
            }
        };

        let mut resident_count = 0;
        let mut mine = Vec::new();
        for key in all_keys {
            match self.keys.classify(&key) {
                Some(CacheKey::Collection { .. }) => {
                    resident_count += 1;
                    mine.push(key);
                }
                Some(CacheKey::Chunk { .. }) => mine.push(key),
                None => {}
            }
        }

        let approximate_size_bytes = match store.get_many(&mine).await {
            Ok(values) => values.values().map(String::len).sum(),
            Err(err) => {
                warn!(%err, "value sizing failed, reporting zero bytes");
                0
            }
        };
        self.stats.snapshot(resident_count, approximate_size_bytes)
    }

    // == Helpers ==
    /// The store public operations go through: primary when its availability
    /// probe passes, the fallback otherwise.
    fn active_store(&self) -> &dyn KeyValueStore {
        if self.primary.is_available() {
            self.primary.as_ref()
        } else {
            self.fallback.as_ref()
        }
    }

    /// Cancellable pause inserted between store batches to stay under host
    /// throughput limits. Returns false when cancelled; cancellation wins
    /// over an elapsed delay.
    async fn pause_between_batches(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.batch_delay()) => true,
        }
    }

    fn validate_owner(owner: &str) -> Result<()> {
        if owner.is_empty() {
            return Err(CacheError::EmptyOwnerKey);
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::InMemoryStore;

    fn test_config() -> CacheConfig {
        CacheConfig {
            chunk_size: 10,
            direct_mode_threshold: 25,
            batch_delay_ms: 0,
            ..CacheConfig::default()
        }
    }

    fn service(config: CacheConfig) -> (CacheService<u32>, Arc<InMemoryStore>, Arc<ManualClock>) {
        let primary = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let service = CacheService::with_clock(
            config,
            primary.clone(),
            Arc::new(InMemoryStore::new()),
            clock.clone(),
        );
        (service, primary, clock)
    }

    #[tokio::test]
    async fn test_empty_owner_key_rejected() {
        let (service, _, _) = service(test_config());

        assert!(matches!(
            service.cache("", &[1]).await,
            Err(CacheError::EmptyOwnerKey)
        ));
        assert!(matches!(
            service.get_cached("").await,
            Err(CacheError::EmptyOwnerKey)
        ));
        assert!(matches!(
            service.clear("").await,
            Err(CacheError::EmptyOwnerKey)
        ));
    }

    #[tokio::test]
    async fn test_direct_round_trip() {
        let (service, primary, _) = service(test_config());
        let items: Vec<u32> = (0..20).collect();

        service.cache("owner", &items).await.unwrap();
        assert_eq!(primary.len().await, 1);

        let read = service.get_cached("owner").await.unwrap().unwrap();
        assert_eq!(read, CacheRead::Complete(items));
    }

    #[tokio::test]
    async fn test_chunked_write_key_count() {
        let (service, primary, _) = service(test_config());
        let items: Vec<u32> = (0..25).collect();

        service.cache("owner", &items).await.unwrap();

        // ceil(25 / 10) chunk keys plus the collection record
        assert_eq!(primary.len().await, 4);
        let read = service.get_cached("owner").await.unwrap().unwrap();
        assert_eq!(read.items(), items.as_slice());
        assert!(read.is_complete());
    }

    #[tokio::test]
    async fn test_recache_collects_previous_generation() {
        let (service, primary, _) = service(test_config());

        service.cache("owner", &(0..30).collect::<Vec<u32>>()).await.unwrap();
        assert_eq!(primary.len().await, 4);

        // Second generation is smaller; first generation's chunks must go
        service.cache("owner", &(0..25).collect::<Vec<u32>>()).await.unwrap();
        assert_eq!(primary.len().await, 4);

        let keys = primary.list_keys().await.unwrap();
        assert!(keys.iter().any(|k| k.contains("_2_")), "keys: {keys:?}");
        assert!(!keys.iter().any(|k| k.contains("_1_")), "keys: {keys:?}");
    }

    #[tokio::test]
    async fn test_direct_recache_collects_chunked_generation() {
        let (service, primary, _) = service(test_config());

        service.cache("owner", &(0..30).collect::<Vec<u32>>()).await.unwrap();
        service.cache("owner", &[1, 2, 3]).await.unwrap();

        assert_eq!(primary.len().await, 1);
        let read = service.get_cached("owner").await.unwrap().unwrap();
        assert_eq!(read, CacheRead::Complete(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_expired_entry_invalidated_on_read() {
        let (service, primary, clock) = service(test_config());

        service.cache("owner", &(0..30).collect::<Vec<u32>>()).await.unwrap();
        clock.advance_ms(service.config.ttl_ms() + 1);

        assert!(service.get_cached("owner").await.unwrap().is_none());
        assert!(primary.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_removes_all_owner_keys() {
        let (service, primary, _) = service(test_config());

        service.cache("owner", &(0..30).collect::<Vec<u32>>()).await.unwrap();
        service.cache("other", &[7u32]).await.unwrap();

        service.clear("owner").await.unwrap();

        assert_eq!(primary.len().await, 1);
        assert!(service.get_cached("owner").await.unwrap().is_none());
        assert!(service.get_cached("other").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats_reflect_store_contents() {
        let (service, _, _) = service(test_config());

        service.cache("a", &(0..30).collect::<Vec<u32>>()).await.unwrap();
        service.cache("b", &[1u32, 2]).await.unwrap();
        let _ = service.get_cached("a").await.unwrap();
        let _ = service.get_cached("missing").await.unwrap();

        let snapshot = service.stats().await;
        assert_eq!(snapshot.resident_count, 2);
        assert!(snapshot.approximate_size_bytes > 0);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
    }

    #[tokio::test]
    async fn test_cancelled_write_keeps_previous_generation() {
        let primary = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cancel = CancellationToken::new();
        let service: CacheService<u32> = CacheService::with_clock(
            test_config(),
            primary.clone(),
            Arc::new(InMemoryStore::new()),
            clock.clone(),
        )
        .with_cancellation(cancel.clone());

        let first: Vec<u32> = (0..30).collect();
        service.cache("owner", &first).await.unwrap();

        cancel.cancel();
        service.cache("owner", &(100..180).collect::<Vec<u32>>()).await.unwrap();

        let read = service.get_cached("owner").await.unwrap().unwrap();
        assert_eq!(read, CacheRead::Complete(first));
    }
}
