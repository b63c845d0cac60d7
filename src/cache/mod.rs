//! Cache Module
//!
//! Provides a concurrent in-memory cache with TTL expiration, plus the cache
//! key rule for flag evaluations.

mod entry;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key::{cache_key, normalize_user_id, ANONYMOUS_USER};
pub use stats::CacheStats;
pub use store::TtlCache;
