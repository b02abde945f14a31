//! TierKV Core - Value and Error Types
//!
//! Pure data structures shared by every TierKV crate: the typed value codec,
//! the record envelope, write entries, engine options and the error
//! taxonomy. No I/O and no logging live here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod config;
pub mod envelope;
pub mod error;
pub mod observe;
pub mod value;

pub use config::{parse_env, EngineOptions, StorageMode};
pub use error::{
    CodecError, CodecResult, ConfigError, KvError, KvResult, StorageError, StorageResult,
};
pub use observe::{EngineObserver, NoopObserver};
pub use value::{TaggedValue, Value, ValueType};

// ============================================================================
// TIERS
// ============================================================================

/// One of the two backing drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Cache,
    Store,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Cache => f.write_str("cache"),
            Tier::Store => f.write_str("store"),
        }
    }
}

// ============================================================================
// ENTRY
// ============================================================================

/// Parameter shape for a single write.
///
/// Not persisted as its own record; the engine frames `value` with the
/// envelope and hands `cost`/`ttl` to the drivers.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Target key. Must be non-empty.
    pub key: String,
    /// Value to store.
    pub value: TaggedValue,
    /// Eviction weight hint. Non-positive means "use the engine default".
    pub cost: i64,
    /// Optional time-to-live. `None` or zero means no expiry.
    pub ttl: Option<Duration>,
}

impl Entry {
    /// Create an entry with default cost and no TTL.
    pub fn new(key: impl Into<String>, value: TaggedValue) -> Self {
        Self {
            key: key.into(),
            value,
            cost: 0,
            ttl: None,
        }
    }

    /// Set the cost.
    pub fn with_cost(mut self, cost: i64) -> Self {
        self.cost = cost;
        self
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The TTL if it is set and positive.
    pub fn effective_ttl(&self) -> Option<Duration> {
        self.ttl.filter(|ttl| !ttl.is_zero())
    }
}
