//! API key record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ValidityReason;
use crate::permission::Permission;

/// A persisted API key.
///
/// A record is valid iff it is not disabled and `now < expires_at` (or it
/// has no expiry).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    /// Bearer secret. Redacted from `Debug` output.
    pub key: String,
    pub name: String,
    pub permissions: BTreeSet<Permission>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled: bool,
}

impl ApiKeyRecord {
    /// Whether `permission` is granted directly or implied by `Admin`.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
            || (permission != Permission::Admin && self.permissions.contains(&Permission::Admin))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// `Ok` if usable at `now`. Disabled is reported before expired.
    pub fn validity_at(&self, now: DateTime<Utc>) -> Result<(), ValidityReason> {
        if self.disabled {
            Err(ValidityReason::Disabled)
        } else if self.is_expired_at(now) {
            Err(ValidityReason::Expired)
        } else {
            Ok(())
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.validity_at(now).is_ok()
    }

    /// Time left until expiry, if the record expires and has time left.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        let expires_at = self.expires_at?;
        (expires_at - now).to_std().ok().filter(|ttl| !ttl.is_zero())
    }
}

impl fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("id", &self.id)
            .field("key", &format_args!("[REDACTED, {} chars]", self.key.len()))
            .field("name", &self.name)
            .field("permissions", &self.permissions)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("disabled", &self.disabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date")
    }

    fn record(permissions: &[Permission]) -> ApiKeyRecord {
        ApiKeyRecord {
            id: "id".to_string(),
            key: "secret-value".to_string(),
            name: "service".to_string(),
            permissions: permissions.iter().copied().collect(),
            created_at: now(),
            expires_at: None,
            disabled: false,
        }
    }

    #[test]
    fn test_admin_implies_other_permissions() {
        let admin = record(&[Permission::Admin]);
        for permission in Permission::ALL {
            assert!(admin.has_permission(permission));
        }

        let reader = record(&[Permission::Read]);
        assert!(reader.has_permission(Permission::Read));
        assert!(!reader.has_permission(Permission::Write));
        assert!(!reader.has_permission(Permission::Admin));
    }

    #[test]
    fn test_validity() {
        let mut r = record(&[Permission::Read]);
        assert_eq!(r.validity_at(now()), Ok(()));

        r.expires_at = Some(now() + Duration::seconds(10));
        assert!(r.is_valid_at(now()));
        assert_eq!(
            r.validity_at(now() + Duration::seconds(10)),
            Err(ValidityReason::Expired)
        );

        r.disabled = true;
        assert_eq!(
            r.validity_at(now() + Duration::seconds(60)),
            Err(ValidityReason::Disabled)
        );
    }

    #[test]
    fn test_remaining_ttl() {
        let mut r = record(&[Permission::Read]);
        assert_eq!(r.remaining_ttl(now()), None);

        r.expires_at = Some(now() + Duration::seconds(30));
        assert_eq!(
            r.remaining_ttl(now()),
            Some(std::time::Duration::from_secs(30))
        );
        assert_eq!(r.remaining_ttl(now() + Duration::seconds(30)), None);
        assert_eq!(r.remaining_ttl(now() + Duration::seconds(31)), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", record(&[Permission::Read]));
        assert!(!debug.contains("secret-value"));
        assert!(debug.contains("REDACTED, 12 chars"));
    }

    #[test]
    fn test_json_roundtrip() {
        let r = record(&[Permission::Write, Permission::Read]);
        let json = serde_json::to_string(&r).expect("serialize");
        assert!(json.contains("\"permissions\":[\"read\",\"write\"]"));
        let back: ApiKeyRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, r);
    }
}
