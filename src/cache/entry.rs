//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with insertion time.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with its insertion timestamp.
///
/// Entries are immutable: a changed value is stored as a new entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the entry was stored (monotonic clock)
    pub inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(value: V) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    // == Age ==
    /// Time elapsed since the entry was stored.
    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }

    // == Is Expired ==
    /// Checks if the entry is older than `ttl`.
    ///
    /// Boundary condition: an entry whose age equals the TTL exactly is still
    /// fresh; it expires once the age is strictly greater.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}
