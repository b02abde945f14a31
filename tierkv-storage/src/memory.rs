//! In-memory reference drivers.
//!
//! [`MemoryCache`] is a bounded cache: every entry carries a cost, and a
//! write that would push the total past `max_cost` evicts the oldest entries
//! first. An entry whose cost alone exceeds `max_cost` is rejected.
//!
//! [`MemoryStore`] is an unbounded map with per-key expiry. Neither survives
//! a restart; use [`crate::LmdbStore`] for durability.
//!
//! Expired entries read as misses immediately and are purged lazily on the
//! next write. Both drivers index entries by deadline, so a write only visits
//! the entries that are actually due.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tierkv_core::{parse_env, ConfigError, KvResult, StorageError, StorageResult, Tier};

use crate::traits::{CacheDriver, CacheStats, StoreDriver};

/// Default capacity of a [`MemoryCache`], in cost units.
pub const DEFAULT_MAX_COST: i64 = 1 << 20;

fn deadline(ttl: Option<Duration>) -> Option<Instant> {
    ttl.filter(|ttl| !ttl.is_zero())
        .and_then(|ttl| Instant::now().checked_add(ttl))
}

fn is_live(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |at| now < at)
}

/// Deadline index: `(expires_at, seq) -> key`, soonest first.
type ExpiryIndex = BTreeMap<(Instant, u64), String>;

/// Pop every key whose deadline is at or before `now`.
fn pop_due(expiries: &mut ExpiryIndex, now: Instant) -> Vec<String> {
    let mut due = Vec::new();
    while let Some(entry) = expiries.first_entry() {
        if entry.key().0 > now {
            break;
        }
        due.push(entry.remove());
    }
    due
}

// ============================================================================
// MEMORY CACHE
// ============================================================================

/// Configuration for [`MemoryCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCacheConfig {
    /// Total cost the cache may hold.
    pub max_cost: i64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_cost: DEFAULT_MAX_COST,
        }
    }
}

impl MemoryCacheConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TIERKV_CACHE_MAX_COST`: capacity in cost units (default: 1048576)
    pub fn from_env() -> KvResult<Self> {
        let max_cost = match std::env::var("TIERKV_CACHE_MAX_COST") {
            Ok(raw) => parse_env("TIERKV_CACHE_MAX_COST", &raw)?,
            Err(_) => DEFAULT_MAX_COST,
        };
        let config = Self { max_cost };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> KvResult<()> {
        if self.max_cost <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_cost".to_string(),
                value: self.max_cost.to_string(),
                reason: "max_cost must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct CachedItem {
    value: Vec<u8>,
    cost: i64,
    expires_at: Option<Instant>,
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    items: HashMap<String, CachedItem>,
    /// Insertion order, oldest first.
    order: BTreeMap<u64, String>,
    expiries: ExpiryIndex,
    used_cost: i64,
    next_seq: u64,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> Option<CachedItem> {
        let item = self.items.remove(key)?;
        self.order.remove(&item.seq);
        if let Some(at) = item.expires_at {
            self.expiries.remove(&(at, item.seq));
        }
        self.used_cost -= item.cost;
        Some(item)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let due = pop_due(&mut self.expiries, now);
        for key in &due {
            if let Some(item) = self.items.remove(key) {
                self.order.remove(&item.seq);
                self.used_cost -= item.cost;
            }
        }
        due.len()
    }

    /// Evict oldest entries until `cost` more fits. Returns the eviction count.
    fn make_room(&mut self, cost: i64, max_cost: i64) -> u64 {
        let mut evicted = 0;
        while self.used_cost + cost > max_cost {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            if self.remove(&key).is_some() {
                evicted += 1;
            }
        }
        evicted
    }
}

/// Bounded, cost-aware in-memory cache.
#[derive(Debug)]
pub struct MemoryCache {
    state: RwLock<CacheState>,
    max_cost: i64,
    closed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

impl MemoryCache {
    /// Create a cache with the given capacity.
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_cost: config.max_cost,
            closed: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a cache holding at most `max_cost` cost units.
    pub fn with_max_cost(max_cost: i64) -> Self {
        Self::new(MemoryCacheConfig { max_cost })
    }

    /// Current usage counters.
    pub fn stats(&self) -> CacheStats {
        let (entry_count, used_cost) = self
            .state
            .read()
            .map(|state| (state.items.len() as u64, state.used_cost))
            .unwrap_or_default();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            used_cost,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn insert(&self, key: &str, value: &[u8], cost: i64, ttl: Option<Duration>) -> StorageResult<()> {
        if self.is_closed() {
            return Err(StorageError::Closed { tier: Tier::Cache });
        }
        if cost > self.max_cost {
            return Err(StorageError::Rejected {
                tier: Tier::Cache,
                key: key.to_string(),
                cost,
                capacity: self.max_cost,
            });
        }

        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        let now = Instant::now();
        state.remove(key);
        state.purge_expired(now);
        let evicted = state.make_room(cost, self.max_cost);
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let expires_at = deadline(ttl);
        if let Some(at) = expires_at {
            state.expiries.insert((at, seq), key.to_string());
        }
        state.order.insert(seq, key.to_string());
        state.used_cost += cost;
        state.items.insert(
            key.to_string(),
            CachedItem {
                value: value.to_vec(),
                cost,
                expires_at,
                seq,
            },
        );
        Ok(())
    }
}

impl CacheDriver for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let found = self.state.read().ok().and_then(|state| {
            state
                .items
                .get(key)
                .filter(|item| is_live(item.expires_at, Instant::now()))
                .map(|item| item.value.clone())
        });
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn set(&self, key: &str, value: &[u8], cost: i64) -> StorageResult<()> {
        self.insert(key, value, cost, None)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        cost: i64,
        ttl: Duration,
    ) -> StorageResult<()> {
        self.insert(key, value, cost, Some(ttl))
    }

    fn delete(&self, key: &str) {
        if let Ok(mut state) = self.state.write() {
            state.remove(key);
        }
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        *state = CacheState::default();
        Ok(())
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[derive(Debug)]
struct StoredItem {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    seq: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    items: HashMap<String, StoredItem>,
    expiries: ExpiryIndex,
    next_seq: u64,
}

impl StoreState {
    fn remove(&mut self, key: &str) -> Option<StoredItem> {
        let item = self.items.remove(key)?;
        if let Some(at) = item.expires_at {
            self.expiries.remove(&(at, item.seq));
        }
        Some(item)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let due = pop_due(&mut self.expiries, now);
        for key in &due {
            self.items.remove(key);
        }
        due.len()
    }
}

/// Unbounded in-memory store. Useful for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.state
            .read()
            .map(|state| {
                let due = state.expiries.range(..=(now, u64::MAX)).count();
                state.items.len() - due
            })
            .unwrap_or(0)
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed { tier: Tier::Store });
        }
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        state.remove(key);
        state.purge_expired(Instant::now());

        let seq = state.next_seq;
        state.next_seq += 1;
        let expires_at = deadline(ttl);
        if let Some(at) = expires_at {
            state.expiries.insert((at, seq), key.to_string());
        }
        state.items.insert(
            key.to_string(),
            StoredItem {
                value: value.to_vec(),
                expires_at,
                seq,
            },
        );
        Ok(())
    }
}

impl StoreDriver for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let state = self.state.read().ok()?;
        state
            .items
            .get(key)
            .filter(|item| is_live(item.expires_at, Instant::now()))
            .map(|item| item.value.clone())
    }

    fn set(&self, key: &str, value: &[u8], _cost: i64) -> StorageResult<()> {
        self.insert(key, value, None)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        _cost: i64,
        ttl: Duration,
    ) -> StorageResult<()> {
        self.insert(key, value, Some(ttl))
    }

    fn delete(&self, key: &str) {
        if let Ok(mut state) = self.state.write() {
            state.remove(key);
        }
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        *state = StoreState::default();
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
