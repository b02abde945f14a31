//! Driver capability traits.
//!
//! The engine composes exactly one [`CacheDriver`] and one [`StoreDriver`].
//! The two contracts carry the same six operations but are deliberately
//! separate traits: a backend opts into being a cache, a store, or both.
//!
//! # Concurrency
//!
//! Drivers hold all mutable state in the system and are shared across
//! threads behind `Arc`, so implementations must be safe for concurrent use.
//!
//! # Placeholders
//!
//! A driver whose [`is_nil`](CacheDriver::is_nil) returns `true` is a no-op
//! stand-in used for single-tier engines.

use std::time::Duration;
use tierkv_core::StorageResult;

/// Fast, possibly lossy tier consulted first on every read.
pub trait CacheDriver: Send + Sync {
    /// Look up raw bytes. `None` on miss or expiry.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store raw bytes with an eviction weight.
    fn set(&self, key: &str, value: &[u8], cost: i64) -> StorageResult<()>;

    /// Store raw bytes that expire after `ttl`.
    fn set_with_ttl(&self, key: &str, value: &[u8], cost: i64, ttl: Duration)
        -> StorageResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str);

    /// Release resources. Later writes may fail.
    fn close(&self) -> StorageResult<()>;

    /// Whether this is a no-op placeholder.
    fn is_nil(&self) -> bool {
        false
    }
}

/// Durable, authoritative tier.
pub trait StoreDriver: Send + Sync {
    /// Look up raw bytes. `None` on miss or expiry.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store raw bytes. `cost` is forwarded but usually ignored by stores.
    fn set(&self, key: &str, value: &[u8], cost: i64) -> StorageResult<()>;

    /// Store raw bytes that expire after `ttl`.
    fn set_with_ttl(&self, key: &str, value: &[u8], cost: i64, ttl: Duration)
        -> StorageResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str);

    /// Flush and release resources. Later writes may fail.
    fn close(&self) -> StorageResult<()>;

    /// Whether this is a no-op placeholder.
    fn is_nil(&self) -> bool {
        false
    }
}

/// Statistics about driver usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of hits.
    pub hits: u64,
    /// Number of misses (including expired entries).
    pub misses: u64,
    /// Number of entries currently held.
    pub entry_count: u64,
    /// Sum of the costs of held entries.
    pub used_cost: i64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
