//! TierKV Storage - Drivers and Engine
//!
//! Provides the [`CacheDriver`] and [`StoreDriver`] capability traits, the
//! reference drivers ([`MemoryCache`], [`MemoryStore`], [`LmdbStore`]), the
//! placeholder drivers used for single-tier engines, and the cache-aside
//! [`Engine`] that composes one of each.

pub mod engine;
pub mod lmdb;
pub mod memory;
pub mod observe;
pub mod placeholder;
pub mod traits;

pub use engine::Engine;
pub use lmdb::{LmdbStore, LmdbStoreConfig, LmdbStoreError};
pub use memory::{MemoryCache, MemoryCacheConfig, MemoryStore, DEFAULT_MAX_COST};
pub use observe::{EngineStats, StatsObserver, TracingObserver};
pub use placeholder::{NilCache, NilStore};
pub use traits::{CacheDriver, CacheStats, StoreDriver};
