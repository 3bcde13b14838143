//! Chunking Module
//!
//! Pure split/reconstruct logic over an ordered item sequence. The store
//! bounds each value to a small byte budget, so large collections are cut
//! into fixed-size slices and stored one key per slice; reconstruction puts
//! them back together in index order regardless of read arrival order.

use serde::{Deserialize, Serialize};

// == Chunk ==
/// One fixed-size slice of an ordered collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    /// Position of this slice within the collection, starting at 0
    pub index: u32,
    /// Number of slices the collection was cut into
    pub total: u32,
    /// The slice's items, in original order
    pub items: Vec<T>,
}

// == Chunk Record ==
/// Persisted form of a [`Chunk`], stamped with its generation.
///
/// Immutable once written; a later write for the same owner produces a new
/// generation under new keys rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord<T> {
    pub index: u32,
    pub total: u32,
    pub version: u64,
    /// Unix milliseconds; shared by every chunk of one generation
    pub timestamp: u64,
    pub items: Vec<T>,
}

impl<T> ChunkRecord<T> {
    /// Stamps a pure chunk with its generation's version and timestamp.
    pub fn from_chunk(chunk: Chunk<T>, version: u64, timestamp: u64) -> Self {
        Self {
            index: chunk.index,
            total: chunk.total,
            version,
            timestamp,
            items: chunk.items,
        }
    }
}

// == Split ==
/// Cuts `items` into chunks of at most `chunk_size` items.
///
/// Deterministic: produces `ceil(items.len() / chunk_size)` chunks with
/// contiguous indices, and concatenating them in index order reproduces
/// `items` exactly. Empty input produces no chunks.
pub fn split<T: Clone>(items: &[T], chunk_size: usize) -> Vec<Chunk<T>> {
    debug_assert!(chunk_size > 0, "chunk_size must be positive");
    let chunk_size = chunk_size.max(1);

    let total = items.len().div_ceil(chunk_size) as u32;
    items
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, slice)| Chunk {
            index: index as u32,
            total,
            items: slice.to_vec(),
        })
        .collect()
}

// == Reconstruct ==
/// Concatenates chunks back into the original collection.
///
/// Sorts by `index` first: chunk reads complete in arbitrary order, and
/// output order must never depend on arrival order.
pub fn reconstruct<T>(mut chunks: Vec<Chunk<T>>) -> Vec<T> {
    chunks.sort_by_key(|chunk| chunk.index);
    chunks.into_iter().flat_map(|chunk| chunk.items).collect()
}
