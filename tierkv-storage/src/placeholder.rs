//! No-op placeholder drivers for single-tier engines.

use std::time::Duration;
use tierkv_core::StorageResult;

use crate::traits::{CacheDriver, StoreDriver};

/// Cache placeholder: every read misses, every write succeeds and is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilCache;

impl CacheDriver for NilCache {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8], _cost: i64) -> StorageResult<()> {
        Ok(())
    }

    fn set_with_ttl(
        &self,
        _key: &str,
        _value: &[u8],
        _cost: i64,
        _ttl: Duration,
    ) -> StorageResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) {}

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    fn is_nil(&self) -> bool {
        true
    }
}

/// Store placeholder: every read misses, every write succeeds and is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilStore;

impl StoreDriver for NilStore {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8], _cost: i64) -> StorageResult<()> {
        Ok(())
    }

    fn set_with_ttl(
        &self,
        _key: &str,
        _value: &[u8],
        _cost: i64,
        _ttl: Duration,
    ) -> StorageResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) {}

    fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    fn is_nil(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_nil_and_inert() {
        let cache = NilCache;
        assert!(cache.is_nil());
        assert!(cache.set("k", b"v", 1).is_ok());
        assert_eq!(cache.get("k"), None);
        assert!(cache.close().is_ok());

        let store = NilStore;
        assert!(store.is_nil());
        assert!(store.set_with_ttl("k", b"v", 1, Duration::from_secs(1)).is_ok());
        assert_eq!(store.get("k"), None);
        store.delete("k");
        assert!(store.close().is_ok());
    }
}
