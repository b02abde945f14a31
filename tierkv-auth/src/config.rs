//! Authorization configuration.

use std::time::Duration;

use tierkv_core::{parse_env, ConfigError, KvResult};

/// Tunables for [`crate::AuthManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Candidate keys tried before creation gives up.
    pub max_creation_attempts: u32,
    /// First backoff between collision probes; doubles each attempt.
    pub base_backoff: Duration,
    /// Cost attached to every persisted record.
    pub record_cost: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_creation_attempts: 10,
            base_backoff: Duration::from_millis(5),
            record_cost: 1,
        }
    }
}

impl AuthConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TIERKV_AUTH_MAX_ATTEMPTS`: key creation attempts (default: 10)
    /// - `TIERKV_AUTH_BACKOFF_MS`: base backoff in milliseconds (default: 5)
    pub fn from_env() -> KvResult<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("TIERKV_AUTH_MAX_ATTEMPTS") {
            config.max_creation_attempts = parse_env("TIERKV_AUTH_MAX_ATTEMPTS", &raw)?;
        }
        if let Ok(raw) = std::env::var("TIERKV_AUTH_BACKOFF_MS") {
            config.base_backoff = Duration::from_millis(parse_env("TIERKV_AUTH_BACKOFF_MS", &raw)?);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> KvResult<()> {
        if self.max_creation_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_creation_attempts".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            }
            .into());
        }
        if self.record_cost <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "record_cost".to_string(),
                value: self.record_cost.to_string(),
                reason: "record_cost must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Sleep before the attempt after `attempt` (zero-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.max_creation_attempts, 10);
        assert_eq!(config.base_backoff, Duration::from_millis(5));
        assert_eq!(config.record_cost, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let config = AuthConfig::default();
        assert_eq!(config.backoff_for(0), Duration::from_millis(5));
        assert_eq!(config.backoff_for(1), Duration::from_millis(10));
        assert_eq!(config.backoff_for(4), Duration::from_millis(80));
        assert_eq!(config.backoff_for(40), Duration::from_millis(5).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_validation() {
        let config = AuthConfig {
            max_creation_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuthConfig {
            record_cost: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
