//! Cache-aside engine.
//!
//! Reads consult the cache first and fall back to the store, repopulating the
//! cache on a store hit. Writes go to the cache and then the store. There is
//! no cross-tier atomicity: the store is authoritative, and the cache may run
//! ahead of it when a store write fails.
//!
//! # Example
//!
//! ```ignore
//! let engine = Engine::new(
//!     Some(Arc::new(MemoryCache::default())),
//!     Some(Arc::new(LmdbStore::open("/var/lib/tierkv", 100)?)),
//!     EngineOptions::default(),
//! )?;
//!
//! engine.set("answer", 42i64, 1)?;
//! let value = engine.get("answer").map(|v| v.as_i64());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tierkv_core::{
    envelope, ConfigError, EngineObserver, EngineOptions, Entry, KvError, KvResult, NoopObserver,
    StorageMode, TaggedValue, Tier, Value,
};

use crate::placeholder::{NilCache, NilStore};
use crate::traits::{CacheDriver, StoreDriver};

/// Two-tier key-value engine.
///
/// Holds no mutable state of its own; share it across threads with `Arc` or
/// clone it (clones share the same drivers).
pub struct Engine {
    cache: Arc<dyn CacheDriver>,
    store: Arc<dyn StoreDriver>,
    options: EngineOptions,
    observer: Arc<dyn EngineObserver>,
}

impl Engine {
    /// Build an engine.
    ///
    /// `Default` mode needs both drivers, `CacheOnly` the cache and
    /// `StoreOnly` the store. The unused tier is replaced by a placeholder
    /// and any driver passed for it is ignored.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingDriver`] when the mode's driver is absent
    /// - [`ConfigError::BothTiersPlaceholder`] when no real tier remains
    /// - [`ConfigError::InvalidValue`] for a negative default cost
    pub fn new(
        cache: Option<Arc<dyn CacheDriver>>,
        store: Option<Arc<dyn StoreDriver>>,
        options: EngineOptions,
    ) -> KvResult<Self> {
        let options = options.normalized()?;
        let mode = options.mode;

        let cache: Arc<dyn CacheDriver> = match mode {
            StorageMode::StoreOnly => Arc::new(NilCache),
            StorageMode::Default | StorageMode::CacheOnly => cache.ok_or(
                ConfigError::MissingDriver {
                    mode,
                    tier: Tier::Cache,
                },
            )?,
        };
        let store: Arc<dyn StoreDriver> = match mode {
            StorageMode::CacheOnly => Arc::new(NilStore),
            StorageMode::Default | StorageMode::StoreOnly => store.ok_or(
                ConfigError::MissingDriver {
                    mode,
                    tier: Tier::Store,
                },
            )?,
        };

        if cache.is_nil() && store.is_nil() {
            return Err(ConfigError::BothTiersPlaceholder.into());
        }

        Ok(Self {
            cache,
            store,
            options,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Attach an observer for hits, misses and swallowed failures.
    pub fn with_observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Tier layout.
    pub fn mode(&self) -> StorageMode {
        self.options.mode
    }

    /// TTL applied when a store hit repopulates the cache.
    pub fn default_ttl(&self) -> Duration {
        self.options.default_ttl
    }

    /// Cost used for repopulation and for non-positive write costs.
    pub fn default_cost(&self) -> i64 {
        self.options.default_cost
    }

    /// Look up `key`.
    ///
    /// Never fails: a miss in both tiers, an empty key, or a value that
    /// cannot be decoded all read as `None`.
    pub fn get(&self, key: &str) -> Option<TaggedValue> {
        if key.is_empty() {
            return None;
        }

        if let Some(raw) = self.cache.get(key) {
            self.observer.cache_hit(key);
            return self.decode(key, Tier::Cache, &raw);
        }

        let Some(raw) = self.store.get(key) else {
            self.observer.miss(key);
            return None;
        };
        self.observer.store_hit(key);
        let value = self.decode(key, Tier::Store, &raw)?;
        self.repopulate(key, &raw);
        Some(value)
    }

    /// Write `value` with no expiry.
    pub fn set(&self, key: &str, value: impl Into<Value>, cost: i64) -> KvResult<()> {
        let value = TaggedValue::new(value)?;
        self.put(Entry::new(key, value).with_cost(cost))
    }

    /// Write `value` expiring after `ttl` in both tiers. A zero `ttl` behaves
    /// like [`Engine::set`].
    pub fn set_with_ttl(
        &self,
        key: &str,
        value: impl Into<Value>,
        cost: i64,
        ttl: Duration,
    ) -> KvResult<()> {
        let value = TaggedValue::new(value)?;
        self.put(Entry::new(key, value).with_cost(cost).with_ttl(ttl))
    }

    /// Write an already-tagged value.
    pub fn put_tagged(&self, key: &str, value: TaggedValue, cost: i64) -> KvResult<()> {
        self.put(Entry::new(key, value).with_cost(cost))
    }

    /// Write an entry: cache first, then store.
    ///
    /// A cache failure aborts before the store is touched. A store failure
    /// is returned with the cache already updated.
    pub fn put(&self, entry: Entry) -> KvResult<()> {
        if entry.key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        let frame = envelope::encode(&entry.value)?;
        let cost = if entry.cost > 0 {
            entry.cost
        } else {
            self.options.default_cost
        };
        let key = entry.key.as_str();

        let cache_result = match entry.effective_ttl() {
            Some(ttl) => self.cache.set_with_ttl(key, &frame, cost, ttl),
            None => self.cache.set(key, &frame, cost),
        };
        if let Err(e) = cache_result {
            self.observer.write_failed(key, Tier::Cache, &e);
            return Err(e.into());
        }

        let store_result = match entry.effective_ttl() {
            Some(ttl) => self.store.set_with_ttl(key, &frame, cost, ttl),
            None => self.store.set(key, &frame, cost),
        };
        if let Err(e) = store_result {
            self.observer.write_failed(key, Tier::Store, &e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove `key` from both tiers. Idempotent.
    pub fn delete(&self, key: &str) {
        self.cache.delete(key);
        self.store.delete(key);
    }

    /// Close the cache, then the store. Both are always attempted; the first
    /// failure is returned.
    pub fn close(&self) -> KvResult<()> {
        let cache_result = self.cache.close();
        if let Err(e) = &cache_result {
            self.observer.close_failed(Tier::Cache, e);
        }
        let store_result = self.store.close();
        if let Err(e) = &store_result {
            self.observer.close_failed(Tier::Store, e);
        }
        cache_result.and(store_result).map_err(KvError::from)
    }

    fn decode(&self, key: &str, tier: Tier, raw: &[u8]) -> Option<TaggedValue> {
        match envelope::decode(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                self.observer.decode_failed(key, tier, &e);
                None
            }
        }
    }

    fn repopulate(&self, key: &str, raw: &[u8]) {
        let cost = self.options.default_cost;
        let result = if self.options.default_ttl.is_zero() {
            self.cache.set(key, raw, cost)
        } else {
            self.cache
                .set_with_ttl(key, raw, cost, self.options.default_ttl)
        };
        if let Err(e) = result {
            self.observer.repopulate_failed(key, &e);
        }
    }
}

impl Clone for Engine {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
            options: self.options.clone(),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.options.mode)
            .field("default_ttl", &self.options.default_ttl)
            .field("default_cost", &self.options.default_cost)
            .field("cache_is_nil", &self.cache.is_nil())
            .field("store_is_nil", &self.store.is_nil())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
