//! Observability capability injected into the engine.
//!
//! The core carries no logger. Hosts that want logs or metrics pass an
//! [`EngineObserver`]; every hook defaults to doing nothing.

use crate::error::{CodecError, StorageError};
use crate::Tier;

/// Hooks fired by the engine on notable events.
pub trait EngineObserver: Send + Sync {
    /// A read was served from the cache.
    fn cache_hit(&self, _key: &str) {}

    /// A read missed the cache and was served from the store.
    fn store_hit(&self, _key: &str) {}

    /// Neither tier held the key.
    fn miss(&self, _key: &str) {}

    /// A present raw value failed to decode and was reported as absent.
    fn decode_failed(&self, _key: &str, _tier: Tier, _error: &CodecError) {}

    /// Repopulating the cache after a store hit failed. The read still succeeded.
    fn repopulate_failed(&self, _key: &str, _error: &StorageError) {}

    /// A write to one tier failed.
    fn write_failed(&self, _key: &str, _tier: Tier, _error: &StorageError) {}

    /// Closing a tier failed.
    fn close_failed(&self, _tier: Tier, _error: &StorageError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}
