//! Integration Tests for the Cache Service
//!
//! Exercises the public surface end to end over an in-memory store pair:
//! direct and chunked round trips, TTL boundaries at simulated time,
//! eviction of the oldest-written collection, partial-read surfacing,
//! fallback degradation, and the two-phase publish.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use inventory_cache::{
    CacheConfig, CacheRead, CacheService, InMemoryStore, KeyValueStore, ManualClock,
};

// == Helper Functions ==

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct InventoryItem {
    id: u64,
    name: String,
    quantity: u32,
}

fn items(count: usize) -> Vec<InventoryItem> {
    (0..count as u64)
        .map(|id| InventoryItem {
            id,
            name: format!("item-{id}"),
            quantity: (id % 7) as u32,
        })
        .collect()
}

fn test_config() -> CacheConfig {
    CacheConfig {
        chunk_size: 100,
        direct_mode_threshold: 1000,
        ttl_secs: 1800,
        max_entries: 20,
        batch_size: 4,
        batch_delay_ms: 0,
        ..CacheConfig::default()
    }
}

struct Harness {
    service: CacheService<InventoryItem>,
    primary: Arc<InMemoryStore>,
    fallback: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
}

fn harness(config: CacheConfig) -> Harness {
    let primary = Arc::new(InMemoryStore::new());
    let fallback = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let service = CacheService::with_clock(
        config,
        primary.clone(),
        fallback.clone(),
        clock.clone(),
    );
    Harness {
        service,
        primary,
        fallback,
        clock,
    }
}

// == Round Trip Tests ==

#[tokio::test]
async fn test_direct_mode_round_trip() {
    let h = harness(test_config());
    let inventory = items(40);

    h.service.cache("user1", &inventory).await.unwrap();

    // Below the direct-mode threshold: exactly one key written
    assert_eq!(h.primary.len().await, 1);

    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    assert_eq!(read, CacheRead::Complete(inventory));
}

#[tokio::test]
async fn test_chunked_mode_round_trip() {
    let h = harness(test_config());
    let inventory = items(2500);

    h.service.cache("user1", &inventory).await.unwrap();

    // ceil(2500 / 100) chunk keys plus the collection record
    assert_eq!(h.primary.len().await, 26);

    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    assert!(read.is_complete());
    assert_eq!(read.items(), inventory.as_slice());
}

#[tokio::test]
async fn test_empty_collection_round_trip() {
    let h = harness(test_config());

    h.service.cache("user1", &[]).await.unwrap();

    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    assert_eq!(read, CacheRead::Complete(vec![]));
}

#[tokio::test]
async fn test_recache_supersedes_previous_collection() {
    let h = harness(test_config());

    h.service.cache("user1", &items(2500)).await.unwrap();
    let replacement = items(1500);
    h.service.cache("user1", &replacement).await.unwrap();

    // 15 chunks of the new generation plus the collection record; the old
    // generation's 25 chunks are gone
    assert_eq!(h.primary.len().await, 16);

    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    assert_eq!(read.items(), replacement.as_slice());
}

// == Expiry Tests ==

#[tokio::test]
async fn test_read_just_before_ttl_hits() {
    let h = harness(test_config());
    let inventory = items(1200);

    h.service.cache("user1", &inventory).await.unwrap();
    h.clock.advance_ms(1800 * 1000 - 1);

    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    assert_eq!(read.items(), inventory.as_slice());
}

#[tokio::test]
async fn test_read_past_ttl_misses_and_purges() {
    let h = harness(test_config());

    h.service.cache("user1", &items(1200)).await.unwrap();
    h.clock.advance_ms(1800 * 1000 + 1);

    assert!(h.service.get_cached("user1").await.unwrap().is_none());

    // Every key belonging to the owner is gone
    assert!(h.primary.is_empty().await);
}

// == Eviction Tests ==

#[tokio::test]
async fn test_eviction_keeps_most_recent_owners() {
    let h = harness(test_config());

    for n in 0..21 {
        h.service
            .cache(&format!("user{n:02}"), &items(10))
            .await
            .unwrap();
        h.clock.advance_ms(1000);
    }

    let snapshot = h.service.stats().await;
    assert_eq!(snapshot.resident_count, 20);
    assert_eq!(snapshot.evictions, 1);

    // The oldest-written owner went, the rest stayed
    assert!(h.service.get_cached("user00").await.unwrap().is_none());
    assert!(h.service.get_cached("user01").await.unwrap().is_some());
    assert!(h.service.get_cached("user20").await.unwrap().is_some());
}

#[tokio::test]
async fn test_eviction_removes_chunked_collections_whole() {
    let config = CacheConfig {
        max_entries: 1,
        ..test_config()
    };
    let h = harness(config);

    h.service.cache("old_user", &items(1500)).await.unwrap();
    h.clock.advance_ms(1000);
    h.service.cache("new_user", &items(10)).await.unwrap();

    // Only the new owner's single direct key remains
    assert_eq!(h.primary.len().await, 1);
    assert!(h.service.get_cached("old_user").await.unwrap().is_none());
}

// == Failure Isolation Tests ==

#[tokio::test]
async fn test_one_lost_chunk_surfaces_as_partial() {
    let h = harness(test_config());
    let inventory = items(2500);

    h.service.cache("user1", &inventory).await.unwrap();

    // Lose exactly one chunk of the first generation
    h.primary.remove("inv_cache_chunk_user1_1_3").await.unwrap();

    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    match read {
        CacheRead::Partial {
            items: recovered,
            missing_chunks,
        } => {
            assert_eq!(missing_chunks, vec![3]);
            assert_eq!(recovered.len(), 2400);
            // Recovered items stay in original order around the hole
            assert_eq!(recovered[0], inventory[0]);
            assert_eq!(recovered[299], inventory[299]);
            assert_eq!(recovered[300], inventory[400]);
        }
        CacheRead::Complete(_) => panic!("lost chunk must not read as complete"),
    }
}

#[tokio::test]
async fn test_failing_chunk_get_surfaces_as_partial() {
    let h = harness(test_config());

    h.service.cache("user1", &items(2500)).await.unwrap();
    h.primary.fail_gets_for("inv_cache_chunk_user1_1_7").await;

    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    match read {
        CacheRead::Partial { missing_chunks, .. } => assert_eq!(missing_chunks, vec![7]),
        CacheRead::Complete(_) => panic!("failing chunk must not read as complete"),
    }
}

#[tokio::test]
async fn test_corrupt_collection_record_reads_as_miss() {
    let h = harness(test_config());

    h.service.cache("user1", &items(40)).await.unwrap();
    h.primary.set("inv_cache_user1", "{broken").await.unwrap();

    assert!(h.service.get_cached("user1").await.unwrap().is_none());
    // The corrupt record was dropped on the way out
    assert_eq!(h.primary.get("inv_cache_user1").await.unwrap(), None);
}

// == Two-Phase Publish Tests ==

#[tokio::test]
async fn test_failed_chunk_write_keeps_previous_generation() {
    let h = harness(test_config());
    let original = items(1200);

    h.service.cache("user1", &original).await.unwrap();

    // The second generation (version 2) loses one chunk write
    h.primary.fail_sets_for("inv_cache_chunk_user1_2_5").await;
    h.service.cache("user1", &items(1100)).await.unwrap();

    // The pointer was never swapped: the original stays complete
    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    assert!(read.is_complete());
    assert_eq!(read.items(), original.as_slice());
}

#[tokio::test]
async fn test_value_ceiling_rejection_keeps_previous_entry() {
    // A primary store with a small value ceiling accepts the direct record
    // but rejects every chunk of a large collection; the earlier entry must
    // survive the failed re-cache.
    let primary = Arc::new(InMemoryStore::with_max_value_size(3000));
    let fallback = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let service: CacheService<InventoryItem> = CacheService::with_clock(
        test_config(),
        primary.clone(),
        fallback,
        clock,
    );

    let original = items(40);
    service.cache("user1", &original).await.unwrap();

    service.cache("user1", &items(1100)).await.unwrap();

    let read = service.get_cached("user1").await.unwrap().unwrap();
    assert_eq!(read.items(), original.as_slice());
}

// == Fallback Tests ==

#[tokio::test]
async fn test_fallback_round_trip_when_primary_unavailable() {
    let h = harness(test_config());
    let inventory = items(2500);

    h.primary.set_available(false);
    h.service.cache("user1", &inventory).await.unwrap();

    // Nothing touched the primary; the fallback holds the collection whole
    assert!(h.primary.is_empty().await);
    assert_eq!(h.fallback.len().await, 1);

    let read = h.service.get_cached("user1").await.unwrap().unwrap();
    assert_eq!(read, CacheRead::Complete(inventory));
}

#[tokio::test]
async fn test_fallback_entries_expire_too() {
    let h = harness(test_config());

    h.primary.set_available(false);
    h.service.cache("user1", &items(50)).await.unwrap();
    h.clock.advance_ms(1800 * 1000 + 1);

    assert!(h.service.get_cached("user1").await.unwrap().is_none());
    assert!(h.fallback.is_empty().await);
}

// == Clear Tests ==

#[tokio::test]
async fn test_clear_removes_owner_from_both_stores() {
    let h = harness(test_config());

    h.primary.set_available(false);
    h.service.cache("user1", &items(30)).await.unwrap();
    h.primary.set_available(true);
    h.service.cache("user1", &items(2500)).await.unwrap();

    h.service.clear("user1").await.unwrap();

    assert!(h.primary.is_empty().await);
    assert!(h.fallback.is_empty().await);
    assert!(h.service.get_cached("user1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_clear_leaves_other_owners_alone() {
    let h = harness(test_config());

    h.service.cache("user1", &items(1200)).await.unwrap();
    h.service.cache("user2", &items(30)).await.unwrap();

    h.service.clear("user1").await.unwrap();

    assert!(h.service.get_cached("user1").await.unwrap().is_none());
    let read = h.service.get_cached("user2").await.unwrap().unwrap();
    assert_eq!(read.items().len(), 30);
}
