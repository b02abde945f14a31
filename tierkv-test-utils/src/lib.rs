//! TierKV Test Utilities
//!
//! Shared test infrastructure for the TierKV workspace:
//! - A fault-injecting driver usable as either tier
//! - Engine fixtures over memory, faulty and LMDB drivers
//! - Proptest generators for values and keys
//! - Tracing setup for tests

pub use tierkv_core::{
    envelope, EngineOptions, Entry, KvError, KvResult, StorageError, StorageMode, StorageResult,
    TaggedValue, Tier, Value, ValueType,
};
pub use tierkv_storage::{
    CacheDriver, Engine, LmdbStore, MemoryCache, MemoryStore, StatsObserver, StoreDriver,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Once, RwLock};
use std::time::Duration;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test-friendly subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `warn` for everything and `debug` for the
/// TierKV crates.
pub fn init_test_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    TRACING.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tierkv_storage=debug,tierkv_auth=debug,warn"));
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

// ============================================================================
// FAULT-INJECTING DRIVER
// ============================================================================

/// In-memory driver whose failures can be switched on at runtime.
///
/// Implements both [`CacheDriver`] and [`StoreDriver`], so the same type can
/// stand in for either tier. TTLs are accepted and ignored.
#[derive(Debug)]
pub struct FaultyDriver {
    tier: Tier,
    items: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_close: AtomicBool,
    unavailable: AtomicBool,
    corrupt_reads: AtomicBool,
    writes: AtomicU64,
    closes: AtomicU64,
}

impl FaultyDriver {
    /// A healthy driver reporting errors as `tier`.
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            items: RwLock::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
            corrupt_reads: AtomicBool::new(false),
            writes: AtomicU64::new(0),
            closes: AtomicU64::new(0),
        }
    }

    /// Make every `set`/`set_with_ttl` fail.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Make `close` fail.
    pub fn fail_close(&self, on: bool) {
        self.fail_close.store(on, Ordering::SeqCst);
    }

    /// Make every read miss and every write fail.
    pub fn set_unavailable(&self, on: bool) {
        self.unavailable.store(on, Ordering::SeqCst);
    }

    /// Return bytes that are not a valid envelope for present keys.
    pub fn corrupt_reads(&self, on: bool) {
        self.corrupt_reads.store(on, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `close` calls, successful or not.
    pub fn close_count(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Raw bytes held for `key`, bypassing fault switches.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.items.read().ok()?.get(key).cloned()
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return None;
        }
        let found = self.raw(key)?;
        if self.corrupt_reads.load(Ordering::SeqCst) {
            return Some(vec![0xFF; found.len().max(1)]);
        }
        Some(found)
    }

    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) || self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                tier: self.tier,
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        let mut items = self.items.write().map_err(|_| StorageError::LockPoisoned)?;
        items.insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) {
        if let Ok(mut items) = self.items.write() {
            items.remove(key);
        }
    }

    fn shut(&self) -> StorageResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(StorageError::CloseFailed {
                tier: self.tier,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl CacheDriver for FaultyDriver {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.read(key)
    }

    fn set(&self, key: &str, value: &[u8], _cost: i64) -> StorageResult<()> {
        self.write(key, value)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        _cost: i64,
        _ttl: Duration,
    ) -> StorageResult<()> {
        self.write(key, value)
    }

    fn delete(&self, key: &str) {
        self.remove(key);
    }

    fn close(&self) -> StorageResult<()> {
        self.shut()
    }
}

impl StoreDriver for FaultyDriver {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.read(key)
    }

    fn set(&self, key: &str, value: &[u8], _cost: i64) -> StorageResult<()> {
        self.write(key, value)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        _cost: i64,
        _ttl: Duration,
    ) -> StorageResult<()> {
        self.write(key, value)
    }

    fn delete(&self, key: &str) {
        self.remove(key);
    }

    fn close(&self) -> StorageResult<()> {
        self.shut()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made engines for common scenarios.

    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Engine over a default [`MemoryCache`] and a [`MemoryStore`].
    pub fn memory_engine() -> Arc<Engine> {
        let cache: Arc<dyn CacheDriver> = Arc::new(MemoryCache::default());
        let store: Arc<dyn StoreDriver> = Arc::new(MemoryStore::new());
        Arc::new(
            Engine::new(Some(cache), Some(store), EngineOptions::default())
                .expect("memory engine should build"),
        )
    }

    /// Engine whose tiers are both [`FaultyDriver`]s, returned for toggling.
    pub fn faulty_engine(
        options: EngineOptions,
    ) -> (Engine, Arc<FaultyDriver>, Arc<FaultyDriver>) {
        let cache = Arc::new(FaultyDriver::new(Tier::Cache));
        let store = Arc::new(FaultyDriver::new(Tier::Store));
        let engine = Engine::new(
            Some(cache.clone() as Arc<dyn CacheDriver>),
            Some(store.clone() as Arc<dyn StoreDriver>),
            options,
        )
        .expect("faulty engine should build");
        (engine, cache, store)
    }

    /// Engine over a [`MemoryCache`] and an [`LmdbStore`] in a fresh temp dir.
    ///
    /// Keep the returned [`TempDir`] alive for as long as the engine is used.
    pub fn lmdb_engine() -> (Arc<Engine>, TempDir) {
        let dir = TempDir::new().expect("TempDir creation should succeed");
        let store: Arc<dyn StoreDriver> =
            Arc::new(LmdbStore::open(dir.path(), 10).expect("lmdb store should open"));
        let cache: Arc<dyn CacheDriver> = Arc::new(MemoryCache::default());
        let engine = Engine::new(Some(cache), Some(store), EngineOptions::default())
            .expect("lmdb engine should build");
        (Arc::new(engine), dir)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for keys and values.

    use super::*;
    use proptest::prelude::*;

    /// Non-empty application key.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9:_./-]{1,48}"
    }

    /// Arbitrary JSON document, a few levels deep.
    pub fn arb_json() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-z ]{0,12}".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|map| {
                    serde_json::Value::Object(map.into_iter().collect())
                }),
            ]
        })
    }

    /// Any storable value. Floats exclude NaN so values compare equal.
    pub fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<String>().prop_map(Value::String),
            any::<i64>().prop_map(Value::Int),
            any::<f64>()
                .prop_filter("NaN never equals itself", |f| !f.is_nan())
                .prop_map(Value::Float),
            any::<bool>().prop_map(Value::Bool),
            prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Binary),
            arb_json().prop_map(Value::Json),
        ]
    }

    /// [`arb_value`] already encoded.
    pub fn arb_tagged_value() -> impl Strategy<Value = TaggedValue> {
        arb_value().prop_filter_map("value must encode", |v| TaggedValue::new(v).ok())
    }

    /// Cost as callers pass it, including non-positive values.
    pub fn arb_cost() -> impl Strategy<Value = i64> {
        -2i64..16
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faulty_driver_toggles() {
        let driver = FaultyDriver::new(Tier::Store);
        assert!(StoreDriver::set(&driver, "k", b"v", 1).is_ok());
        assert_eq!(StoreDriver::get(&driver, "k"), Some(b"v".to_vec()));

        driver.set_unavailable(true);
        assert_eq!(StoreDriver::get(&driver, "k"), None);
        assert!(StoreDriver::set(&driver, "k2", b"v", 1).is_err());
        driver.set_unavailable(false);

        driver.corrupt_reads(true);
        assert_ne!(StoreDriver::get(&driver, "k"), Some(b"v".to_vec()));
        assert_eq!(driver.raw("k"), Some(b"v".to_vec()));
        driver.corrupt_reads(false);

        driver.fail_close(true);
        assert!(StoreDriver::close(&driver).is_err());
        assert_eq!(driver.close_count(), 1);
        assert_eq!(driver.write_count(), 1);
    }

    #[test]
    fn test_fixtures_build() {
        let engine = fixtures::memory_engine();
        assert_eq!(engine.mode(), StorageMode::Default);

        let (engine, _dir) = fixtures::lmdb_engine();
        assert!(engine.set("k", 1i64, 1).is_ok());
        assert!(engine.get("k").is_some());
    }

    #[test]
    fn test_init_test_tracing_is_reentrant() {
        init_test_tracing();
        init_test_tracing();
    }
}
