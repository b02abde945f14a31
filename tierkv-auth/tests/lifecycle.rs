//! API key lifecycle against real engines.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tierkv_auth::{
    ensure_application_key, record_key, ApiKeyRecord, AuthConfig, AuthError, AuthManager,
    AuthResult, ManualClock, Operation, Permission, ValidityReason,
};
use tierkv_test_utils::fixtures::{faulty_engine, lmdb_engine, memory_engine};
use tierkv_test_utils::{init_test_tracing, EngineOptions, StorageMode};

fn arb_permissions() -> impl Strategy<Value = BTreeSet<Permission>> {
    prop::collection::btree_set(prop::sample::select(Permission::ALL.to_vec()), 1..=4)
}

#[test]
fn test_full_lifecycle_on_lmdb() -> AuthResult<()> {
    init_test_tracing();
    let (engine, _dir) = lmdb_engine();
    let manager = AuthManager::new(engine.clone());

    let record = manager.create_api_key(
        "ingest-worker",
        &[Permission::Read, Permission::Write],
        false,
        Some(Duration::from_secs(3600)),
    )?;
    assert!(manager.authorize(&record.key, Operation::Set).is_ok());

    manager.disable_api_key(&record.key)?;
    assert_eq!(
        manager.authorize(&record.key, Operation::Get),
        Err(AuthError::Validity(ValidityReason::Disabled))
    );

    manager.enable_api_key(&record.key)?;
    let reloaded = manager.get_api_key(&record.key)?;
    assert_eq!(reloaded.expires_at, record.expires_at);
    assert!(!reloaded.disabled);

    manager.delete_api_key(&record.key)?;
    assert_eq!(manager.get_api_key(&record.key), Err(AuthError::NotFound));
    Ok(())
}

#[test]
fn test_records_are_plain_engine_entries() -> AuthResult<()> {
    let engine = memory_engine();
    let manager = AuthManager::new(engine.clone());
    let record = manager.create_api_key("reporting", &[Permission::Read], false, None)?;

    let stored = engine
        .get(&record_key(&record.key))
        .expect("record stored under the reserved prefix");
    let decoded: ApiKeyRecord = stored.as_json().expect("record is JSON");
    assert_eq!(decoded, record);

    assert!(ensure_application_key(&record_key(&record.key)).is_err());
    Ok(())
}

#[test]
fn test_store_only_engine() -> AuthResult<()> {
    let (engine, _cache, store) =
        faulty_engine(EngineOptions::new().with_mode(StorageMode::StoreOnly));
    let manager = AuthManager::new(Arc::new(engine));
    let record = manager.create_api_key("store-only", &[Permission::Delete], false, None)?;

    assert!(store.raw(&record_key(&record.key)).is_some());
    assert!(manager.authorize(&record.key, Operation::Delete).is_ok());
    Ok(())
}

#[test]
fn test_storage_failure_is_internal_and_opaque() {
    init_test_tracing();
    let (engine, _cache, store) = faulty_engine(EngineOptions::default());
    store.fail_writes(true);
    let manager = AuthManager::new(Arc::new(engine));

    let err = manager
        .create_api_key("unlucky", &[Permission::Read], false, None)
        .unwrap_err();
    assert!(matches!(err, AuthError::Internal { source: Some(_), .. }));
    assert_eq!(err.public_message(), "internal error");
}

#[test]
fn test_enable_rejected_after_expiry() -> AuthResult<()> {
    let start = Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid date");
    let clock = Arc::new(ManualClock::new(start));
    let manager = AuthManager::with_config(memory_engine(), AuthConfig::default())?
        .with_clock(clock.clone());

    let record = manager.create_api_key(
        "short-lived",
        &[Permission::Read],
        true,
        Some(Duration::from_secs(60)),
    )?;
    clock.advance(chrono::Duration::seconds(61));

    assert_eq!(
        manager.enable_api_key(&record.key),
        Err(AuthError::Validity(ValidityReason::Expired))
    );
    Ok(())
}

#[test]
fn test_concurrent_creation_yields_unique_keys() {
    let manager = Arc::new(AuthManager::new(memory_engine()));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || {
                manager.create_api_key(&format!("worker-{i}"), &[Permission::Read], false, None)
            })
        })
        .collect();

    let keys: BTreeSet<String> = handles
        .into_iter()
        .map(|h| {
            h.join()
                .expect("thread should not panic")
                .expect("creation should succeed")
                .key
        })
        .collect();
    assert_eq!(keys.len(), 8);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_admin_implies_everything_but_itself(permissions in arb_permissions()) {
        let record = ApiKeyRecord {
            id: "id".to_string(),
            key: "key".to_string(),
            name: "generated".to_string(),
            permissions: permissions.clone(),
            created_at: Utc::now(),
            expires_at: None,
            disabled: false,
        };
        for p in Permission::ALL {
            let expected = permissions.contains(&p)
                || (p != Permission::Admin && permissions.contains(&Permission::Admin));
            prop_assert_eq!(record.has_permission(p), expected);
        }
    }

    #[test]
    fn prop_authorize_matches_policy(permissions in arb_permissions()) {
        let manager = AuthManager::new(memory_engine());
        let perms: Vec<Permission> = permissions.iter().copied().collect();
        let record = manager
            .create_api_key("property", &perms, false, None)
            .expect("creation should succeed");
        for op in Operation::ALL {
            let required = manager.policy().required(op);
            prop_assert_eq!(
                manager.authorize(&record.key, op).is_ok(),
                record.has_permission(required)
            );
        }
    }
}
