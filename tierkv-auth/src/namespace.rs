//! Reserved key namespace for API key records.
//!
//! Records live in the same engine as application data, under
//! [`API_KEY_PREFIX`]. Transports must run [`ensure_application_key`] on
//! every client-supplied key so clients cannot read or overwrite records.

use crate::error::{AuthError, AuthResult};

/// Prefix of every stored API key record.
pub const API_KEY_PREFIX: &str = "internal::api::key::";

/// Engine key holding the record for `token`.
pub fn record_key(token: &str) -> String {
    format!("{API_KEY_PREFIX}{token}")
}

/// Reject client keys that fall inside the reserved namespace.
pub fn ensure_application_key(key: &str) -> AuthResult<()> {
    if key.starts_with(API_KEY_PREFIX) {
        return Err(AuthError::validation(format!(
            "keys starting with {API_KEY_PREFIX:?} are reserved"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key() {
        assert_eq!(record_key("abc"), "internal::api::key::abc");
    }

    #[test]
    fn test_reserved_keys_rejected() {
        assert!(ensure_application_key("user:42").is_ok());
        assert!(ensure_application_key("internal::api::other").is_ok());
        assert!(matches!(
            ensure_application_key("internal::api::key::abc"),
            Err(AuthError::Validation { .. })
        ));
    }
}
