//! Engine tests against a real LMDB store.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tempfile::TempDir;
use tierkv_core::{EngineOptions, KvResult, StorageMode, TaggedValue};
use tierkv_storage::{CacheDriver, Engine, LmdbStore, LmdbStoreConfig, MemoryCache, StoreDriver};

fn open_engine(dir: &TempDir) -> KvResult<(Engine, Arc<LmdbStore>)> {
    let store = Arc::new(LmdbStore::from_config(&LmdbStoreConfig {
        path: dir.path().to_path_buf(),
        max_size_mb: 10,
    })?);
    let cache: Arc<dyn CacheDriver> = Arc::new(MemoryCache::default());
    let engine = Engine::new(Some(cache), Some(store.clone()), EngineOptions::default())?;
    Ok((engine, store))
}

#[test]
fn test_values_survive_reopen() -> KvResult<()> {
    let dir = TempDir::new().expect("TempDir creation should succeed");
    {
        let (engine, _store) = open_engine(&dir)?;
        engine.set("name", "tierkv", 1)?;
        engine.set("count", 12i64, 1)?;
        engine.close()?;
    }

    let (engine, _store) = open_engine(&dir)?;
    assert_eq!(
        engine.get("name").map(|v| v.as_string()),
        Some(Ok("tierkv".to_string()))
    );
    assert_eq!(engine.get("count").map(|v| v.as_i64()), Some(Ok(12)));
    Ok(())
}

#[test]
fn test_store_only_ttl_expiry() -> KvResult<()> {
    let dir = TempDir::new().expect("TempDir creation should succeed");
    let store: Arc<dyn StoreDriver> = Arc::new(LmdbStore::open(dir.path(), 10)?);
    let engine = Engine::new(
        None,
        Some(store),
        EngineOptions::new().with_mode(StorageMode::StoreOnly),
    )?;

    engine.set_with_ttl("session", "abc", 1, Duration::from_millis(50))?;
    assert!(engine.get("session").is_some());
    std::thread::sleep(Duration::from_millis(100));
    assert!(engine.get("session").is_none());
    Ok(())
}

#[test]
fn test_delete_reaches_store() -> KvResult<()> {
    let dir = TempDir::new().expect("TempDir creation should succeed");
    let (engine, store) = open_engine(&dir)?;
    engine.set("k", true, 1)?;
    assert!(store.get("k").is_some());
    engine.delete("k");
    assert!(store.get("k").is_none());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_set_get_through_lmdb(key in "[a-z]{1,16}", payload in any::<String>()) {
        let dir = TempDir::new().expect("TempDir creation should succeed");
        let (engine, _store) = open_engine(&dir).expect("engine should open");
        engine.set(&key, payload.clone(), 1).expect("set should succeed");
        let got = engine.get(&key).expect("value present");
        prop_assert_eq!(got, TaggedValue::new(payload).expect("string encodes"));
    }
}
