//! TTL Cache Store Module
//!
//! Concurrent key-value store where every entry expires a fixed TTL after it
//! was written. Backed by a sharded `DashMap`, so unrelated keys never contend
//! on a single lock and readers only take a shard read lock.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tracing::trace;

use crate::cache::stats::StatsCounters;
use crate::cache::{CacheEntry, CacheStats};

// == TTL Cache ==
/// Concurrent store with time-based expiry.
///
/// Stale entries are never returned: `get` checks freshness before handing a
/// value out, and the background sweep (see [`crate::tasks`]) reclaims entries
/// nobody reads again. Every removal of a stale entry is a single atomic
/// check-and-delete on the map slot, so a concurrent `put` that refreshed the
/// key is never discarded.
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    /// Key-value storage
    entries: DashMap<K, CacheEntry<V>>,
    /// Lifetime of each entry after insertion
    ttl: Duration,
    /// Performance counters
    stats: StatsCounters,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty cache whose entries live for `ttl`.
    ///
    /// No sweep runs until one is attached with
    /// [`spawn_sweep_task`](crate::tasks::spawn_sweep_task).
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            stats: StatsCounters::default(),
        }
    }

    /// Returns the configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Get ==
    /// Retrieves a fresh value by key.
    ///
    /// A stale entry counts as a miss and is removed before returning.
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(self.ttl) {
                self.stats.record_hit();
                return Some(entry.value.clone());
            }
        } else {
            self.stats.record_miss();
            return None;
        }

        // The shard guard is released above; eviction re-checks staleness
        // under the write lock.
        if self.evict_if_expired(key) {
            self.stats.record_expiration();
            trace!("Cache entry expired on read");
        }
        self.stats.record_miss();
        None
    }

    // == Put ==
    /// Stores a value, replacing any previous entry and resetting its TTL.
    pub fn put(&self, key: K, value: V) {
        self.entries.insert(key, CacheEntry::new(value));
    }

    // == Invalidate ==
    /// Removes an entry. Absent keys are a no-op.
    ///
    /// Returns true if an entry was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Clear ==
    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    // == Evict If Expired ==
    /// Removes the entry only if the one currently stored is still stale.
    ///
    /// The staleness check and the removal happen under the same shard write
    /// lock. An entry refreshed by a concurrent `put` after the caller saw it
    /// stale is fresh again and stays.
    pub fn evict_if_expired(&self, key: &K) -> bool {
        let ttl = self.ttl;
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(ttl))
            .is_some()
    }

    // == Purge Expired ==
    /// Removes every entry that is stale at the moment of its removal.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        // Collect first: removing while iterating would deadlock on the
        // shard the iterator holds.
        let candidates: Vec<K> = self
            .entries
            .iter()
            .filter(|slot| slot.value().is_expired(self.ttl))
            .map(|slot| slot.key().clone())
            .collect();

        let removed = candidates
            .iter()
            .filter(|key| self.evict_if_expired(key))
            .count();

        self.stats.record_swept(removed);
        removed
    }

    // == Length ==
    /// Returns the current number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }
}
