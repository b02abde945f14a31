//! TierKV Auth - API Key Management
//!
//! API keys are ordinary engine entries stored under a reserved prefix
//! ([`API_KEY_PREFIX`]). [`AuthManager`] creates, loads, toggles, re-expires
//! and deletes them; transports call [`AuthManager::authorize`] with the
//! [`Operation`] a request resolves to before dispatching it, and
//! [`ensure_application_key`] on every client-supplied key.
//!
//! # Example
//!
//! ```ignore
//! let manager = AuthManager::new(engine.clone());
//! let record = manager.create_api_key("billing-service", &[Permission::Read], false, None)?;
//!
//! let op = Operation::from_http_method("GET").ok_or(AuthError::validation("unsupported"))?;
//! manager.authorize(&record.key, op)?;
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod namespace;
pub mod permission;
pub mod policy;
pub mod record;
pub mod token;

pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, ValidityReason};
pub use manager::{AuthManager, MIN_NAME_CHARS};
pub use namespace::{ensure_application_key, record_key, API_KEY_PREFIX};
pub use permission::Permission;
pub use policy::{parse_bearer, AccessPolicy, Operation, RPC_SERVICE_PREFIX};
pub use record::ApiKeyRecord;
pub use token::{DefaultTokenGenerator, TokenGenerator, ID_ALPHABET, ID_LENGTH, KEY_BYTES};
