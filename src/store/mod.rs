//! Store Module
//!
//! Abstracts the key-value stores the cache writes through: the constrained
//! primary backing store and the unconstrained local fallback. Both sides of
//! that split implement the same [`KeyValueStore`] contract; the difference
//! is capability (per-value size ceiling, availability), not shape.

mod memory;
mod traits;

// Re-export public types
pub use memory::InMemoryStore;
pub use traits::{KeyValueStore, StoreResult};
