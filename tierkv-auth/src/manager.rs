//! API key lifecycle on top of an [`Engine`].
//!
//! Records are stored as JSON values under the reserved namespace, with the
//! engine TTL set to the time remaining until `expires_at`. The manager holds
//! no state beyond its collaborators, so it can be shared across threads.
//!
//! # Record states
//!
//! ```text
//! created ──► active ⇄ disabled ──► expired (computed at read time)
//!                 └─────────┴──────► deleted (explicit or store TTL)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tierkv_core::{Entry, KvError, TaggedValue};
use tierkv_storage::Engine;

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult, ValidityReason};
use crate::namespace::record_key;
use crate::permission::Permission;
use crate::policy::{AccessPolicy, Operation};
use crate::record::ApiKeyRecord;
use crate::token::{DefaultTokenGenerator, TokenGenerator};

/// Minimum length of a key name, in characters.
pub const MIN_NAME_CHARS: usize = 5;

/// Creates, loads and mutates API key records.
#[derive(Clone)]
pub struct AuthManager {
    engine: Arc<Engine>,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
    policy: AccessPolicy,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Manager with default configuration, system clock and random tokens.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            config: AuthConfig::default(),
            clock: Arc::new(SystemClock),
            tokens: Arc::new(DefaultTokenGenerator),
            policy: AccessPolicy::default(),
        }
    }

    /// Manager with explicit configuration.
    pub fn with_config(engine: Arc<Engine>, config: AuthConfig) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::validation(e.to_string()))?;
        Ok(Self {
            config,
            ..Self::new(engine)
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create and persist a new key.
    ///
    /// A `ttl` of zero means no expiry. Candidate secrets are probed against
    /// the engine and retried with exponential backoff on collision.
    pub fn create_api_key(
        &self,
        name: &str,
        permissions: &[Permission],
        disabled: bool,
        ttl: Option<Duration>,
    ) -> AuthResult<ApiKeyRecord> {
        if name.chars().count() < MIN_NAME_CHARS {
            return Err(AuthError::validation(format!(
                "name must be at least {MIN_NAME_CHARS} characters long"
            )));
        }
        if permissions.is_empty() {
            return Err(AuthError::validation(
                "permissions must contain at least 1 permission",
            ));
        }

        let now = self.clock.now();
        let expires_at = match ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|_| AuthError::validation("ttl is out of range"))?;
                Some(
                    now.checked_add_signed(ttl)
                        .ok_or_else(|| AuthError::validation("ttl is out of range"))?,
                )
            }
            None => None,
        };

        let key = self.unique_key()?;
        let record = ApiKeyRecord {
            id: self.tokens.generate_id(),
            key,
            name: name.to_string(),
            permissions: permissions.iter().copied().collect(),
            created_at: now,
            expires_at,
            disabled,
        };
        self.persist(&record, now)?;

        tracing::info!(id = %record.id, name = %record.name, "created api key");
        Ok(record)
    }

    /// Load a valid record.
    pub fn get_api_key(&self, token: &str) -> AuthResult<ApiKeyRecord> {
        let record = self.load(token)?;
        record
            .validity_at(self.clock.now())
            .map_err(AuthError::Validity)?;
        Ok(record)
    }

    pub fn disable_api_key(&self, token: &str) -> AuthResult<()> {
        self.update(token, |record| record.disabled = true)
    }

    /// Re-enable a key. Disabled keys can be enabled; expired keys cannot.
    pub fn enable_api_key(&self, token: &str) -> AuthResult<()> {
        self.update(token, |record| record.disabled = false)
    }

    /// Move a key's expiry. `expires_at` must be in the future.
    pub fn set_expiration(&self, token: &str, expires_at: DateTime<Utc>) -> AuthResult<()> {
        ensure_token(token)?;
        if expires_at <= self.clock.now() {
            return Err(AuthError::validation("expiration can not be in the past"));
        }
        self.update(token, |record| record.expires_at = Some(expires_at))
    }

    /// Remove a key. Removing an absent key succeeds.
    pub fn delete_api_key(&self, token: &str) -> AuthResult<()> {
        ensure_token(token)?;
        self.engine.delete(&record_key(token));
        Ok(())
    }

    /// Check that `token` is valid and may perform `operation`.
    pub fn authorize(&self, token: &str, operation: Operation) -> AuthResult<ApiKeyRecord> {
        let record = self.get_api_key(token)?;
        let required = self.policy.required(operation);
        if !record.has_permission(required) {
            tracing::debug!(id = %record.id, %operation, %required, "permission denied");
            return Err(AuthError::PermissionDenied {
                operation,
                required,
            });
        }
        Ok(record)
    }

    fn unique_key(&self) -> AuthResult<String> {
        let attempts = self.config.max_creation_attempts;
        for attempt in 0..attempts {
            let candidate = self.tokens.generate_key();
            if self.engine.get(&record_key(&candidate)).is_none() {
                return Ok(candidate);
            }
            tracing::debug!(attempt, "api key collision");
            if attempt + 1 < attempts {
                std::thread::sleep(self.config.backoff_for(attempt));
            }
        }
        Err(AuthError::internal_message("failed to create a unique key"))
    }

    fn load(&self, token: &str) -> AuthResult<ApiKeyRecord> {
        ensure_token(token)?;
        let value = self
            .engine
            .get(&record_key(token))
            .ok_or(AuthError::NotFound)?;
        value.as_json::<ApiKeyRecord>().map_err(|e| {
            AuthError::internal("failed to decode api key record", KvError::from(e))
        })
    }

    /// Load, require not expired, mutate, re-persist.
    fn update(&self, token: &str, mutate: impl FnOnce(&mut ApiKeyRecord)) -> AuthResult<()> {
        let mut record = self.load(token)?;
        let now = self.clock.now();
        if record.is_expired_at(now) {
            return Err(AuthError::Validity(ValidityReason::Expired));
        }
        mutate(&mut record);
        self.persist(&record, now)
    }

    fn persist(&self, record: &ApiKeyRecord, now: DateTime<Utc>) -> AuthResult<()> {
        let value = TaggedValue::from_json(record).map_err(|e| {
            AuthError::internal("failed to encode api key record", KvError::from(e))
        })?;
        let mut entry =
            Entry::new(record_key(&record.key), value).with_cost(self.config.record_cost);
        if record.expires_at.is_some() {
            let ttl = record
                .remaining_ttl(now)
                .ok_or(AuthError::Validity(ValidityReason::Expired))?;
            entry = entry.with_ttl(ttl);
        }
        self.engine
            .put(entry)
            .map_err(|e| AuthError::internal("failed to save api key record", e))
    }
}

fn ensure_token(token: &str) -> AuthResult<()> {
    if token.is_empty() {
        return Err(AuthError::validation("malformed key"));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tierkv_core::EngineOptions;
    use tierkv_storage::{CacheDriver, MemoryCache, MemoryStore, StoreDriver};

    fn engine() -> Arc<Engine> {
        let cache: Arc<dyn CacheDriver> = Arc::new(MemoryCache::default());
        let store: Arc<dyn StoreDriver> = Arc::new(MemoryStore::new());
        Arc::new(
            Engine::new(Some(cache), Some(store), EngineOptions::default())
                .expect("engine construction should succeed"),
        )
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date")
    }

    fn fast_config() -> AuthConfig {
        AuthConfig {
            base_backoff: Duration::from_millis(1),
            ..Default::default()
        }
    }

    /// Hands out a scripted sequence of keys, then falls back to fresh ones.
    struct ScriptedTokens {
        keys: Mutex<Vec<String>>,
    }

    impl ScriptedTokens {
        fn new(keys: &[&str]) -> Self {
            let mut keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
            keys.reverse();
            Self {
                keys: Mutex::new(keys),
            }
        }
    }

    impl TokenGenerator for ScriptedTokens {
        fn generate_id(&self) -> String {
            DefaultTokenGenerator.generate_id()
        }

        fn generate_key(&self) -> String {
            self.keys
                .lock()
                .ok()
                .and_then(|mut keys| keys.pop())
                .unwrap_or_else(|| DefaultTokenGenerator.generate_key())
        }
    }

    #[test]
    fn test_create_and_get() -> AuthResult<()> {
        let manager = AuthManager::new(engine());
        let record = manager.create_api_key("billing", &[Permission::Read], false, None)?;
        assert_eq!(record.id.len(), 32);
        assert_eq!(record.expires_at, None);

        let loaded = manager.get_api_key(&record.key)?;
        assert_eq!(loaded, record);
        Ok(())
    }

    #[test]
    fn test_create_validation() {
        let manager = AuthManager::new(engine());
        assert!(matches!(
            manager.create_api_key("abcd", &[Permission::Read], false, None),
            Err(AuthError::Validation { .. })
        ));
        assert!(matches!(
            manager.create_api_key("billing", &[], false, None),
            Err(AuthError::Validation { .. })
        ));
        // five characters, more than five bytes
        assert!(manager
            .create_api_key("ünïcø", &[Permission::Read], false, None)
            .is_ok());
    }

    #[test]
    fn test_created_disabled_reports_disabled() -> AuthResult<()> {
        let manager = AuthManager::new(engine());
        let record = manager.create_api_key("billing", &[Permission::Read], true, None)?;
        assert_eq!(
            manager.get_api_key(&record.key),
            Err(AuthError::Validity(ValidityReason::Disabled))
        );
        Ok(())
    }

    #[test]
    fn test_collisions_retry_within_bound() -> AuthResult<()> {
        let engine = engine();
        let seed = AuthManager::with_config(engine.clone(), fast_config())?;
        let taken = seed.create_api_key("existing", &[Permission::Read], false, None)?;

        let scripted = vec![taken.key.as_str(); 3];
        let manager = AuthManager::with_config(engine, fast_config())?
            .with_token_generator(Arc::new(ScriptedTokens::new(&scripted)));
        let record = manager.create_api_key("newcomer", &[Permission::Read], false, None)?;
        assert_ne!(record.key, taken.key);
        Ok(())
    }

    #[test]
    fn test_collisions_exhaust_attempts() -> AuthResult<()> {
        let engine = engine();
        let config = AuthConfig {
            max_creation_attempts: 4,
            ..fast_config()
        };
        let seed = AuthManager::with_config(engine.clone(), config.clone())?;
        let taken = seed.create_api_key("existing", &[Permission::Read], false, None)?;

        let scripted = vec![taken.key.as_str(); 4];
        let manager = AuthManager::with_config(engine, config)?
            .with_token_generator(Arc::new(ScriptedTokens::new(&scripted)));
        let result = manager.create_api_key("newcomer", &[Permission::Read], false, None);
        assert!(matches!(result, Err(AuthError::Internal { source: None, .. })));
        Ok(())
    }

    #[test]
    fn test_disable_enable_cycle() -> AuthResult<()> {
        let manager = AuthManager::new(engine());
        let record = manager.create_api_key("billing", &[Permission::Write], false, None)?;

        manager.disable_api_key(&record.key)?;
        assert_eq!(
            manager.get_api_key(&record.key),
            Err(AuthError::Validity(ValidityReason::Disabled))
        );

        manager.enable_api_key(&record.key)?;
        assert!(manager.get_api_key(&record.key)?.has_permission(Permission::Write));
        Ok(())
    }

    #[test]
    fn test_expiry_follows_clock() -> AuthResult<()> {
        let clock = Arc::new(ManualClock::new(start()));
        let manager = AuthManager::new(engine()).with_clock(clock.clone());
        let record = manager.create_api_key(
            "billing",
            &[Permission::Read],
            false,
            Some(Duration::from_secs(3600)),
        )?;
        assert_eq!(record.expires_at, Some(start() + chrono::Duration::hours(1)));
        assert!(manager.get_api_key(&record.key).is_ok());

        clock.advance(chrono::Duration::hours(2));
        assert_eq!(
            manager.get_api_key(&record.key),
            Err(AuthError::Validity(ValidityReason::Expired))
        );
        assert_eq!(
            manager.disable_api_key(&record.key),
            Err(AuthError::Validity(ValidityReason::Expired))
        );
        Ok(())
    }

    #[test]
    fn test_set_expiration() -> AuthResult<()> {
        let clock = Arc::new(ManualClock::new(start()));
        let manager = AuthManager::new(engine()).with_clock(clock.clone());
        let record = manager.create_api_key("billing", &[Permission::Read], false, None)?;

        assert!(matches!(
            manager.set_expiration(&record.key, start() - chrono::Duration::seconds(1)),
            Err(AuthError::Validation { .. })
        ));
        assert!(matches!(
            manager.set_expiration(&record.key, start()),
            Err(AuthError::Validation { .. })
        ));

        let new_expiry = start() + chrono::Duration::minutes(10);
        manager.set_expiration(&record.key, new_expiry)?;
        assert_eq!(manager.get_api_key(&record.key)?.expires_at, Some(new_expiry));

        clock.advance(chrono::Duration::minutes(11));
        assert_eq!(
            manager.get_api_key(&record.key),
            Err(AuthError::Validity(ValidityReason::Expired))
        );
        Ok(())
    }

    #[test]
    fn test_set_expiration_missing_key() {
        let manager = AuthManager::new(engine());
        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(
            manager.set_expiration("does-not-exist", future),
            Err(AuthError::NotFound)
        );
    }

    #[test]
    fn test_delete_is_idempotent() -> AuthResult<()> {
        let manager = AuthManager::new(engine());
        let record = manager.create_api_key("billing", &[Permission::Read], false, None)?;
        manager.delete_api_key(&record.key)?;
        manager.delete_api_key(&record.key)?;
        assert_eq!(manager.get_api_key(&record.key), Err(AuthError::NotFound));
        Ok(())
    }

    #[test]
    fn test_empty_token_is_malformed() {
        let manager = AuthManager::new(engine());
        assert!(matches!(
            manager.get_api_key(""),
            Err(AuthError::Validation { .. })
        ));
        assert!(matches!(
            manager.delete_api_key(""),
            Err(AuthError::Validation { .. })
        ));
    }

    #[test]
    fn test_corrupt_record_is_internal() -> AuthResult<()> {
        let engine = engine();
        engine
            .set(&record_key("broken"), "not a record", 1)
            .map_err(|e| AuthError::internal("setup", e))?;
        let manager = AuthManager::new(engine);
        assert!(matches!(
            manager.get_api_key("broken"),
            Err(AuthError::Internal { source: Some(_), .. })
        ));
        Ok(())
    }

    #[test]
    fn test_authorize() -> AuthResult<()> {
        let manager = AuthManager::new(engine());
        let reader = manager.create_api_key("reader", &[Permission::Read], false, None)?;
        let admin = manager.create_api_key("operator", &[Permission::Admin], false, None)?;

        assert!(manager.authorize(&reader.key, Operation::Get).is_ok());
        assert_eq!(
            manager.authorize(&reader.key, Operation::Set),
            Err(AuthError::PermissionDenied {
                operation: Operation::Set,
                required: Permission::Write,
            })
        );
        assert!(manager.authorize(&admin.key, Operation::Delete).is_ok());
        assert!(manager.authorize(&admin.key, Operation::CreateApiKey).is_ok());
        assert_eq!(
            manager.authorize("unknown", Operation::Get),
            Err(AuthError::NotFound)
        );
        Ok(())
    }
}
