//! Inventory Cache - a chunked client-side cache for large collections
//!
//! Makes a frequently-refetched remote collection available locally for fast
//! reload when the only persistent store bounds value sizes and key counts.
//! Collections above a size threshold are split into chunks written under
//! versioned keys; entries expire by TTL and the oldest-written collections
//! are evicted once a resident budget is exceeded. An unconstrained fallback
//! store takes over when the primary store is unavailable.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{CacheRead, CacheService, CacheStatsSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result, StoreError};
pub use store::{InMemoryStore, KeyValueStore};
