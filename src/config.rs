//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Key prefix under which all cache state lives in the backing store
    pub namespace: String,
    /// Number of items stored per chunk key
    pub chunk_size: usize,
    /// Collections shorter than this are stored whole under a single key
    pub direct_mode_threshold: usize,
    /// Time-to-live in seconds; entries older than this are treated as misses
    pub ttl_secs: u64,
    /// Maximum number of resident cached collections (by owner key)
    pub max_entries: usize,
    /// Number of store operations kept in flight per batch
    pub batch_size: usize,
    /// Pause between batches, to stay under host throughput limits
    pub batch_delay_ms: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `INV_CACHE_NAMESPACE` - Key prefix (default: "inv_cache")
    /// - `INV_CACHE_CHUNK_SIZE` - Items per chunk (default: 100)
    /// - `INV_CACHE_DIRECT_THRESHOLD` - Direct-mode item limit (default: 1000)
    /// - `INV_CACHE_TTL_SECS` - Entry TTL in seconds (default: 1800)
    /// - `INV_CACHE_MAX_ENTRIES` - Resident collection budget (default: 20)
    /// - `INV_CACHE_BATCH_SIZE` - Concurrent store ops per batch (default: 4)
    /// - `INV_CACHE_BATCH_DELAY_MS` - Pause between batches (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            namespace: env::var("INV_CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            chunk_size: env::var("INV_CACHE_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.chunk_size),
            direct_mode_threshold: env::var("INV_CACHE_DIRECT_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.direct_mode_threshold),
            ttl_secs: env::var("INV_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ttl_secs),
            max_entries: env::var("INV_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_entries),
            batch_size: env::var("INV_CACHE_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            batch_delay_ms: env::var("INV_CACHE_BATCH_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_delay_ms),
        }
    }

    /// TTL as a millisecond count, the unit record timestamps use.
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_secs * 1000
    }

    /// Pause between batches as a [`Duration`].
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "inv_cache".to_string(),
            chunk_size: 100,
            direct_mode_threshold: 1000,
            ttl_secs: 1800,
            max_entries: 20,
            batch_size: 4,
            batch_delay_ms: 50,
        }
    }
}
