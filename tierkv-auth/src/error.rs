//! Authorization error types.

use std::fmt;
use thiserror::Error;
use tierkv_core::KvError;

use crate::permission::Permission;
use crate::policy::Operation;

/// Why a present record is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidityReason {
    Expired,
    Disabled,
}

impl fmt::Display for ValidityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidityReason::Expired => f.write_str("expired"),
            ValidityReason::Disabled => f.write_str("disabled"),
        }
    }
}

/// Errors raised by [`crate::AuthManager`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    /// Caller input was rejected before touching storage.
    #[error("{message}")]
    Validation { message: String },

    #[error("api key not found")]
    NotFound,

    #[error("api key is {0}")]
    Validity(ValidityReason),

    #[error("permission denied: {operation} requires {required}")]
    PermissionDenied {
        operation: Operation,
        required: Permission,
    },

    /// Storage or codec failure. Never shown verbatim to clients.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<KvError>,
    },
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::Validation {
            message: message.into(),
        }
    }

    /// Build an internal error and log it with its cause.
    pub fn internal(message: impl Into<String>, source: impl Into<KvError>) -> Self {
        let message = message.into();
        let source = source.into();
        tracing::error!(error = %source, "{message}");
        AuthError::Internal {
            message,
            source: Some(source),
        }
    }

    /// Build an internal error that has no underlying cause, and log it.
    pub fn internal_message(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("{message}");
        AuthError::Internal {
            message,
            source: None,
        }
    }

    /// Message safe to return across a transport boundary.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Validation { message } => message.clone(),
            AuthError::NotFound | AuthError::Validity(_) => "unauthenticated".to_string(),
            AuthError::PermissionDenied { operation, .. } => {
                format!("insufficient permissions for {operation}")
            }
            AuthError::Internal { .. } => "internal error".to_string(),
        }
    }
}

/// Result type for authorization operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use tierkv_core::StorageError;

    #[test]
    fn test_public_message_hides_internals() {
        let err = AuthError::internal(
            "failed to save api key record",
            KvError::Storage(StorageError::LockPoisoned),
        );
        assert_eq!(err.public_message(), "internal error");
        assert!(err.to_string().contains("failed to save"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_public_message_collapses_lookup_failures() {
        assert_eq!(AuthError::NotFound.public_message(), "unauthenticated");
        assert_eq!(
            AuthError::Validity(ValidityReason::Disabled).public_message(),
            "unauthenticated"
        );
        assert_eq!(
            AuthError::validation("name must be at least 5 characters long").public_message(),
            "name must be at least 5 characters long"
        );
    }

    #[test]
    fn test_validity_display() {
        assert_eq!(
            AuthError::Validity(ValidityReason::Expired).to_string(),
            "api key is expired"
        );
    }

    #[test]
    fn test_internal_without_source() {
        let err = AuthError::internal_message("failed to create a unique key");
        assert!(err.source().is_none());
    }
}
