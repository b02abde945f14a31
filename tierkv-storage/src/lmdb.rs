//! LMDB-backed durable store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped,
//! crash-safe key-value store for the authoritative tier.
//!
//! # Record Layout
//!
//! ```text
//! ┌──────────────────────┬─────────────────────┐
//! │ expires_at (8 bytes) │ payload (N bytes)   │
//! │ i64 LE, unix millis  │ opaque envelope     │
//! └──────────────────────┴─────────────────────┘
//! ```
//!
//! `expires_at == 0` means the record never expires. Expired records read as
//! misses and are deleted on the read that observes them.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. Reads use read transactions; writes and
//! deletes each commit their own write transaction. The lazy expiry delete
//! re-checks the header inside its write transaction, so it never removes a
//! record written after the read that saw it expired.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tierkv_core::{parse_env, ConfigError, KvError, KvResult, StorageError, StorageResult, Tier};

use crate::traits::StoreDriver;

const EXPIRY_LEN: usize = 8;

const BYTES_PER_MB: usize = 1024 * 1024;

fn map_size_bytes(max_size_mb: usize) -> Option<usize> {
    max_size_mb.checked_mul(BYTES_PER_MB)
}

/// Split a stored frame into its expiry (unix millis, 0 = never) and payload.
fn split_frame(bytes: &[u8]) -> Option<(i64, &[u8])> {
    if bytes.len() < EXPIRY_LEN {
        return None;
    }
    let (header, payload) = bytes.split_at(EXPIRY_LEN);
    let mut expiry = [0u8; EXPIRY_LEN];
    expiry.copy_from_slice(header);
    Some((i64::from_le_bytes(expiry), payload))
}

fn is_expired(expires_at: i64, now_millis: i64) -> bool {
    expires_at != 0 && expires_at <= now_millis
}

/// Error type for opening an LMDB store.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for KvError {
    fn from(e: LmdbStoreError) -> Self {
        KvError::Storage(StorageError::Backend {
            tier: Tier::Store,
            reason: e.to_string(),
        })
    }
}

/// Configuration for [`LmdbStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmdbStoreConfig {
    /// Directory holding the LMDB files. Created if missing.
    pub path: PathBuf,
    /// Map size in megabytes.
    pub max_size_mb: usize,
}

impl LmdbStoreConfig {
    /// Create a configuration for `path` with a 1 GiB map.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_mb: 1024,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TIERKV_LMDB_PATH`: data directory (required)
    /// - `TIERKV_LMDB_MAX_SIZE_MB`: map size in megabytes (default: 1024)
    pub fn from_env() -> KvResult<Self> {
        let path = std::env::var("TIERKV_LMDB_PATH").map_err(|_| ConfigError::InvalidValue {
            field: "TIERKV_LMDB_PATH".to_string(),
            value: String::new(),
            reason: "must be set".to_string(),
        })?;
        let mut config = Self::new(path);
        if let Ok(raw) = std::env::var("TIERKV_LMDB_MAX_SIZE_MB") {
            config.max_size_mb = parse_env("TIERKV_LMDB_MAX_SIZE_MB", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> KvResult<()> {
        if self.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: "0".to_string(),
                reason: "max_size_mb must be positive".to_string(),
            }
            .into());
        }
        if map_size_bytes(self.max_size_mb).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "map size in bytes overflows usize".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Durable store backed by a single unnamed LMDB database.
///
/// # Example
///
/// ```ignore
/// use tierkv_storage::{LmdbStore, StoreDriver};
///
/// let store = LmdbStore::open("/var/lib/tierkv", 100)?;
/// store.set("greeting", b"hello", 1)?;
/// assert_eq!(store.get("greeting"), Some(b"hello".to_vec()));
/// store.close()?;
/// ```
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    closed: AtomicBool,
}

impl std::fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStore")
            .field("path", &self.env.path())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl LmdbStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_size_mb` does not fit in a byte count
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let map_size = map_size_bytes(max_size_mb).ok_or_else(|| {
            LmdbStoreError::EnvOpen(format!("map size of {max_size_mb} MB overflows usize"))
        })?;
        std::fs::create_dir_all(&path)?;

        // SAFETY: each store owns its directory; the environment is not
        // opened twice within one process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "opened lmdb store");

        Ok(Self {
            env,
            db,
            closed: AtomicBool::new(false),
        })
    }

    /// Open a store from configuration.
    pub fn from_config(config: &LmdbStoreConfig) -> KvResult<Self> {
        config.validate()?;
        Ok(Self::open(&config.path, config.max_size_mb)?)
    }

    fn backend_error(e: impl std::fmt::Display) -> StorageError {
        StorageError::Backend {
            tier: Tier::Store,
            reason: e.to_string(),
        }
    }

    fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed { tier: Tier::Store });
        }

        let expires_at = match ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) => {
                let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                Utc::now().timestamp_millis().saturating_add(millis.max(1))
            }
            None => 0,
        };

        let mut frame = Vec::with_capacity(EXPIRY_LEN + value.len());
        frame.extend_from_slice(&expires_at.to_le_bytes());
        frame.extend_from_slice(value);

        let write_failed = |e: heed::Error| StorageError::WriteFailed {
            tier: Tier::Store,
            key: key.to_string(),
            reason: e.to_string(),
        };

        let mut wtxn = self.env.write_txn().map_err(write_failed)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &frame)
            .map_err(write_failed)?;
        wtxn.commit().map_err(write_failed)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(Self::backend_error)?;
        let deleted = self
            .db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(Self::backend_error)?;
        wtxn.commit().map_err(Self::backend_error)?;
        Ok(deleted)
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let rtxn = self.env.read_txn().map_err(Self::backend_error)?;
        let Some(bytes) = self
            .db
            .get(&rtxn, key.as_bytes())
            .map_err(Self::backend_error)?
        else {
            return Ok(None);
        };

        let Some((expires_at, payload)) = split_frame(bytes) else {
            return Err(Self::backend_error(format!(
                "record for key {key:?} is {} bytes, shorter than its expiry header",
                bytes.len()
            )));
        };

        if is_expired(expires_at, Utc::now().timestamp_millis()) {
            drop(rtxn);
            self.purge_if_expired(key)?;
            return Ok(None);
        }
        Ok(Some(payload.to_vec()))
    }

    /// Delete `key` only if the committed record is still expired.
    ///
    /// The header is re-read under the write transaction; a writer that
    /// replaced the record since the caller's read keeps its value.
    fn purge_if_expired(&self, key: &str) -> StorageResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(Self::backend_error)?;
        let expired = self
            .db
            .get(&wtxn, key.as_bytes())
            .map_err(Self::backend_error)?
            .and_then(split_frame)
            .is_some_and(|(expires_at, _)| is_expired(expires_at, Utc::now().timestamp_millis()));
        if !expired {
            return Ok(false);
        }
        self.db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(Self::backend_error)?;
        wtxn.commit().map_err(Self::backend_error)?;
        Ok(true)
    }
}

impl StoreDriver for LmdbStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        match self.read(key) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key, error = %e, "lmdb read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &[u8], _cost: i64) -> StorageResult<()> {
        self.write(key, value, None)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        _cost: i64,
        ttl: Duration,
    ) -> StorageResult<()> {
        self.write(key, value, Some(ttl))
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.remove(key) {
            tracing::warn!(key, error = %e, "lmdb delete failed");
        }
    }

    fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.env
            .force_sync()
            .map_err(|e| StorageError::CloseFailed {
                tier: Tier::Store,
                reason: e.to_string(),
            })
    }
}
