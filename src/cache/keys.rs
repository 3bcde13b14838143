//! Key Scheme Module
//!
//! Deterministic naming for every key the cache persists, plus the reverse
//! mapping used by eviction and clearing: classify a raw store key and
//! recover the owner it belongs to.
//!
//! Layout: `<ns>_<owner>` for collection records, `<ns>_chunk_<owner>_<version>_<index>`
//! for chunk records. Owner keys are opaque and may contain underscores, so
//! chunk parsing is anchored at the right: the version and index are always
//! the final two segments.

// == Classified Key ==
/// A store key recognized as belonging to the cache namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// Collection record (direct payload or chunked descriptor)
    Collection { owner: String },
    /// One chunk of a chunked generation
    Chunk {
        owner: String,
        version: u64,
        index: u32,
    },
}

impl CacheKey {
    /// Owner key this cache key belongs to.
    pub fn owner(&self) -> &str {
        match self {
            CacheKey::Collection { owner } => owner,
            CacheKey::Chunk { owner, .. } => owner,
        }
    }
}

// == Key Scheme ==
/// Builds and parses the persisted key layout for one namespace.
#[derive(Debug, Clone)]
pub struct KeyScheme {
    collection_prefix: String,
    chunk_prefix: String,
}

impl KeyScheme {
    // == Constructor ==
    pub fn new(namespace: &str) -> Self {
        Self {
            collection_prefix: format!("{namespace}_"),
            chunk_prefix: format!("{namespace}_chunk_"),
        }
    }

    // == Collection Key ==
    /// Key holding the owner's collection record.
    pub fn collection_key(&self, owner: &str) -> String {
        format!("{}{owner}", self.collection_prefix)
    }

    // == Chunk Key ==
    /// Key holding one chunk of the given generation.
    pub fn chunk_key(&self, owner: &str, version: u64, index: u32) -> String {
        format!("{}{owner}_{version}_{index}", self.chunk_prefix)
    }

    /// All chunk keys of one generation, in index order.
    pub fn chunk_keys(&self, owner: &str, version: u64, total_chunks: u32) -> Vec<String> {
        (0..total_chunks)
            .map(|index| self.chunk_key(owner, version, index))
            .collect()
    }

    // == Classify ==
    /// Recognizes a raw store key as one of ours, or `None` for foreign keys.
    ///
    /// Chunk keys are tried first since the chunk prefix extends the
    /// collection prefix; a key under the chunk prefix whose tail does not
    /// parse as `<version>_<index>` falls through to the collection form.
    pub fn classify(&self, key: &str) -> Option<CacheKey> {
        if let Some(rest) = key.strip_prefix(&self.chunk_prefix) {
            if let Some(chunk) = Self::parse_chunk_rest(rest) {
                return Some(chunk);
            }
        }
        let owner = key.strip_prefix(&self.collection_prefix)?;
        if owner.is_empty() {
            return None;
        }
        Some(CacheKey::Collection {
            owner: owner.to_string(),
        })
    }

    /// Splits `<owner>_<version>_<index>` from the right, keeping any
    /// underscores inside the owner intact.
    fn parse_chunk_rest(rest: &str) -> Option<CacheKey> {
        let (head, index) = rest.rsplit_once('_')?;
        let (owner, version) = head.rsplit_once('_')?;
        if owner.is_empty() {
            return None;
        }
        let version: u64 = version.parse().ok()?;
        let index: u32 = index.parse().ok()?;
        Some(CacheKey::Chunk {
            owner: owner.to_string(),
            version,
            index,
        })
    }
}
