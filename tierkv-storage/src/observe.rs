//! Engine observers backed by `tracing` and atomic counters.

use std::sync::atomic::{AtomicU64, Ordering};

use tierkv_core::{CodecError, EngineObserver, StorageError, Tier};

/// Emits a `tracing` event for every engine event.
///
/// Hits and misses are `trace`, swallowed failures are `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EngineObserver for TracingObserver {
    fn cache_hit(&self, key: &str) {
        tracing::trace!(key, "cache hit");
    }

    fn store_hit(&self, key: &str) {
        tracing::trace!(key, "store hit");
    }

    fn miss(&self, key: &str) {
        tracing::trace!(key, "miss");
    }

    fn decode_failed(&self, key: &str, tier: Tier, error: &CodecError) {
        tracing::warn!(key, %tier, error = %error, "stored value failed to decode");
    }

    fn repopulate_failed(&self, key: &str, error: &StorageError) {
        tracing::warn!(key, error = %error, "cache repopulation failed");
    }

    fn write_failed(&self, key: &str, tier: Tier, error: &StorageError) {
        tracing::warn!(key, %tier, error = %error, "write failed");
    }

    fn close_failed(&self, tier: Tier, error: &StorageError) {
        tracing::error!(%tier, error = %error, "close failed");
    }
}

/// Point-in-time counters collected by [`StatsObserver`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub cache_hits: u64,
    pub store_hits: u64,
    pub misses: u64,
    pub decode_failures: u64,
    pub repopulate_failures: u64,
    pub write_failures: u64,
}

impl EngineStats {
    /// Fraction of reads served by either tier (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.cache_hits + self.store_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Counts engine events.
#[derive(Debug, Default)]
pub struct StatsObserver {
    cache_hits: AtomicU64,
    store_hits: AtomicU64,
    misses: AtomicU64,
    decode_failures: AtomicU64,
    repopulate_failures: AtomicU64,
    write_failures: AtomicU64,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            repopulate_failures: self.repopulate_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

impl EngineObserver for StatsObserver {
    fn cache_hit(&self, _key: &str) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn store_hit(&self, _key: &str) {
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self, _key: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn decode_failed(&self, _key: &str, _tier: Tier, _error: &CodecError) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn repopulate_failed(&self, _key: &str, _error: &StorageError) {
        self.repopulate_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn write_failed(&self, _key: &str, _tier: Tier, _error: &StorageError) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }
}
