//! Error types for TierKV operations

use crate::{StorageMode, Tier, ValueType};
use thiserror::Error;

/// Driver-level errors raised by cache and store tiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Write to {tier} failed for key '{key}': {reason}")]
    WriteFailed {
        tier: Tier,
        key: String,
        reason: String,
    },

    #[error("Item for key '{key}' rejected by {tier}: cost {cost} exceeds capacity {capacity}")]
    Rejected {
        tier: Tier,
        key: String,
        cost: i64,
        capacity: i64,
    },

    #[error("Failed to close {tier}: {reason}")]
    CloseFailed { tier: Tier, reason: String },

    #[error("{tier} is closed")]
    Closed { tier: Tier },

    #[error("Backend error in {tier}: {reason}")]
    Backend { tier: Tier, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Typed value codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("data is not {expected}, but {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("int overflow: {value} is out of range for type {target}")]
    Overflow { value: i64, target: &'static str },

    #[error("invalid data length for {value_type}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        value_type: ValueType,
        expected: usize,
        actual: usize,
    },

    #[error("string data is not valid UTF-8")]
    InvalidUtf8,

    #[error("json error: {reason}")]
    Json { reason: String },

    #[error("value cannot be nil")]
    NilValue,

    #[error("unknown type tag: {0}")]
    UnknownTypeTag(u8),

    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },
}

/// Configuration errors. These are fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{tier} driver is required for {mode} mode")]
    MissingDriver { mode: StorageMode, tier: Tier },

    #[error("cache and store can not both be placeholders")]
    BothTiersPlaceholder,

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("key must not be empty")]
    EmptyKey,
}

/// Result type alias for storage driver operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type alias for engine operations.
pub type KvResult<T> = Result<T, KvError>;

// =============================================================================
// TESTS
// =============================================================================
