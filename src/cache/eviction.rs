//! Eviction Module
//!
//! Enforces the resident-collection budget. The backing store offers no
//! cheap read-time bookkeeping, so the policy is least-recently-written:
//! every persisted record carries its write timestamp, and reconciliation
//! derives the eviction order from the store itself rather than from
//! in-process state.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::keys::{CacheKey, KeyScheme};
use crate::store::KeyValueStore;

/// Minimal view of any persisted record, enough to order groups by age.
#[derive(Debug, Deserialize)]
struct Stamped {
    timestamp: u64,
}

/// All keys belonging to one owner, as found in the store.
#[derive(Debug, Default)]
struct OwnerGroup {
    keys: Vec<String>,
    collection_key: Option<String>,
    first_chunk_key: Option<String>,
}

impl OwnerGroup {
    /// Key whose record carries the group's timestamp. Chunk records all
    /// share the collection's stamp, so any one of them will do when the
    /// collection record itself is gone.
    fn probe_key(&self) -> Option<&String> {
        self.collection_key
            .as_ref()
            .or(self.first_chunk_key.as_ref())
    }
}

// == Eviction Manager ==
/// Reconciles the resident set against the configured budget.
#[derive(Debug, Clone)]
pub struct EvictionManager {
    keys: KeyScheme,
    max_entries: usize,
}

impl EvictionManager {
    // == Constructor ==
    pub fn new(keys: KeyScheme, max_entries: usize) -> Self {
        Self { keys, max_entries }
    }

    // == Reconcile ==
    /// Removes oldest-written collections until the budget is met.
    ///
    /// Runs opportunistically after writes, not continuously. Partial
    /// removal failures are logged and do not abort remaining removals.
    /// Returns the number of collections evicted.
    pub async fn reconcile(&self, store: &dyn KeyValueStore) -> usize {
        let all_keys = match store.list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%err, "key listing failed, skipping eviction pass");
                return 0;
            }
        };

        let groups = self.group_by_owner(&all_keys);
        if groups.len() <= self.max_entries {
            return 0;
        }
        let excess = groups.len() - self.max_entries;

        let mut ordered = self.order_by_timestamp(store, groups).await;
        ordered.truncate(excess);

        let mut evicted = 0;
        for (owner, group) in ordered {
            match store.remove_many(&group.keys).await {
                Ok(()) => {
                    info!(owner, keys = group.keys.len(), "evicted cached collection");
                    evicted += 1;
                }
                Err(err) => {
                    warn!(owner, %err, "eviction removal failed, continuing");
                }
            }
        }
        evicted
    }

    /// Classifies raw store keys and buckets them per owner. Foreign keys
    /// outside the cache namespace are ignored.
    fn group_by_owner(&self, all_keys: &[String]) -> HashMap<String, OwnerGroup> {
        let mut groups: HashMap<String, OwnerGroup> = HashMap::new();
        for key in all_keys {
            let Some(classified) = self.keys.classify(key) else {
                continue;
            };
            let group = groups.entry(classified.owner().to_string()).or_default();
            match classified {
                CacheKey::Collection { .. } => group.collection_key = Some(key.clone()),
                CacheKey::Chunk { .. } => {
                    if group.first_chunk_key.is_none() {
                        group.first_chunk_key = Some(key.clone());
                    }
                }
            }
            group.keys.push(key.clone());
        }
        groups
    }

    /// Orders groups oldest write first. A group whose records cannot be
    /// read or parsed sorts as oldest; it is dead weight either way.
    async fn order_by_timestamp(
        &self,
        store: &dyn KeyValueStore,
        groups: HashMap<String, OwnerGroup>,
    ) -> Vec<(String, OwnerGroup)> {
        let probe_keys: Vec<String> = groups
            .values()
            .filter_map(|group| group.probe_key().cloned())
            .collect();
        let probed = match store.get_many(&probe_keys).await {
            Ok(values) => values,
            Err(err) => {
                debug!(%err, "timestamp probe failed, treating groups as unordered");
                HashMap::new()
            }
        };

        let mut ordered: Vec<(u64, String, OwnerGroup)> = groups
            .into_iter()
            .map(|(owner, group)| {
                let timestamp = group
                    .probe_key()
                    .and_then(|key| probed.get(key))
                    .and_then(|value| serde_json::from_str::<Stamped>(value).ok())
                    .map(|stamped| stamped.timestamp)
                    .unwrap_or(0);
                (timestamp, owner, group)
            })
            .collect();
        ordered.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        ordered
            .into_iter()
            .map(|(_, owner, group)| (owner, group))
            .collect()
    }
}
