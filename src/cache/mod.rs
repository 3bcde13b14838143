//! Cache Module
//!
//! Chunked collection caching with TTL expiry, versioned generations, and
//! least-recently-written eviction over a constrained key-value store.

mod chunk;
mod eviction;
mod keys;
mod meta;
mod service;
mod stats;


// Re-export public types
pub use chunk::{reconstruct, split, Chunk, ChunkRecord};
pub use eviction::EvictionManager;
pub use keys::{CacheKey, KeyScheme};
pub use meta::{CollectionRecord, MetadataStore};
pub use service::{CacheRead, CacheService};
pub use stats::{CacheStats, CacheStatsSnapshot};
