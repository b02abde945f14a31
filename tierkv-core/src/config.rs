//! Configuration types

use crate::error::{ConfigError, KvResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which tiers an engine runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageMode {
    /// Cache and store both real.
    #[default]
    Default,
    /// Store replaced by a placeholder.
    CacheOnly,
    /// Cache replaced by a placeholder.
    StoreOnly,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageMode::Default => "Default",
            StorageMode::CacheOnly => "CacheOnly",
            StorageMode::StoreOnly => "StoreOnly",
        };
        f.write_str(name)
    }
}

impl FromStr for StorageMode {
    type Err = ConfigError;

    /// Parse a storage mode (case-insensitive, `-`/`_` optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "default" => Ok(StorageMode::Default),
            "cacheonly" => Ok(StorageMode::CacheOnly),
            "storeonly" => Ok(StorageMode::StoreOnly),
            _ => Err(ConfigError::InvalidValue {
                field: "mode".to_string(),
                value: s.to_string(),
                reason: "expected one of default, cache-only, store-only".to_string(),
            }),
        }
    }
}

/// Engine construction options. Fixed for the engine's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// TTL applied when a store hit repopulates the cache. Zero means none.
    pub default_ttl: Duration,
    /// Cost used for repopulation and for writes given a non-positive cost.
    pub default_cost: i64,
    /// Tier layout.
    pub mode: StorageMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_ttl: Duration::ZERO,
            default_cost: 1,
            mode: StorageMode::Default,
        }
    }
}

impl EngineOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the default cost.
    pub fn with_default_cost(mut self, cost: i64) -> Self {
        self.default_cost = cost;
        self
    }

    /// Set the storage mode.
    pub fn with_mode(mut self, mode: StorageMode) -> Self {
        self.mode = mode;
        self
    }

    /// Create options from environment variables.
    ///
    /// Environment variables:
    /// - `TIERKV_DEFAULT_TTL_SECS`: repopulation TTL in seconds (default: 0, none)
    /// - `TIERKV_DEFAULT_COST`: default cost (default: 1)
    /// - `TIERKV_STORAGE_MODE`: `default`, `cache-only` or `store-only` (default: default)
    pub fn from_env() -> KvResult<Self> {
        let defaults = Self::default();

        let default_ttl = match std::env::var("TIERKV_DEFAULT_TTL_SECS") {
            Ok(raw) => Duration::from_secs(parse_env("TIERKV_DEFAULT_TTL_SECS", &raw)?),
            Err(_) => defaults.default_ttl,
        };

        let default_cost = match std::env::var("TIERKV_DEFAULT_COST") {
            Ok(raw) => parse_env("TIERKV_DEFAULT_COST", &raw)?,
            Err(_) => defaults.default_cost,
        };

        let mode = match std::env::var("TIERKV_STORAGE_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.mode,
        };

        let options = Self {
            default_ttl,
            default_cost,
            mode,
        };
        options.validate()?;
        Ok(options)
    }

    /// Validate the options.
    ///
    /// A zero cost is accepted here and normalised by [`EngineOptions::normalized`].
    pub fn validate(&self) -> KvResult<()> {
        if self.default_cost < 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_cost".to_string(),
                value: self.default_cost.to_string(),
                reason: "default_cost must not be negative".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Validate and fill in defaults (a zero cost becomes 1).
    pub fn normalized(mut self) -> KvResult<Self> {
        self.validate()?;
        if self.default_cost == 0 {
            self.default_cost = 1;
        }
        Ok(self)
    }
}

/// Parse a numeric environment value, reporting the variable on failure.
pub fn parse_env<T: FromStr>(field: &str, raw: &str) -> KvResult<T> {
    raw.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "not a valid number".to_string(),
        }
        .into()
    })
}

// =============================================================================
// TESTS
// =============================================================================
