//! Error types for the inventory cache
//!
//! Provides unified error handling using thiserror.
//!
//! The public cache operations recover storage-layer failures internally
//! (a broken cache degrades to a cache miss, never to an application
//! failure), so the only error they ever return is the programmer-error
//! class: an empty owner key.

use thiserror::Error;

// == Store Error Enum ==
/// Transport-level failure reported by a [`KeyValueStore`] implementation.
///
/// Ordinary quota/size rejections are not errors: `set` returns `false`
/// for those. This enum covers the cases where the store itself could not
/// service the call.
///
/// [`KeyValueStore`]: crate::store::KeyValueStore
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store is not present or not initialized
    #[error("Backing store unavailable")]
    Unavailable,

    /// The store backend reported a failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache public surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Owner key was empty; the cache cannot derive keys for it
    #[error("Owner key must not be empty")]
    EmptyOwnerKey,

    /// A stored value was not valid JSON for its expected record shape
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

// == Result Type Alias ==
/// Convenience Result type for the inventory cache.
pub type Result<T> = std::result::Result<T, CacheError>;
