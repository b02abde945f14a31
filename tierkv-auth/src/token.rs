//! Record ID and secret key generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;

/// Length of a record ID, in characters.
pub const ID_LENGTH: usize = 32;

/// Number of random bytes behind a secret key.
pub const KEY_BYTES: usize = 32;

/// Alphabet for record IDs. Omits characters that are easy to misread.
pub const ID_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Produces record IDs and bearer secrets.
pub trait TokenGenerator: Send + Sync {
    /// Opaque identifier for a new record.
    fn generate_id(&self) -> String;

    /// Candidate bearer secret. Uniqueness is checked by the caller.
    fn generate_key(&self) -> String;
}

/// Thread-local CSPRNG backed generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTokenGenerator;

impl TokenGenerator for DefaultTokenGenerator {
    fn generate_id(&self) -> String {
        let mut rng = rand::rng();
        (0..ID_LENGTH)
            .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }

    fn generate_key(&self) -> String {
        let mut bytes = [0u8; KEY_BYTES];
        rand::rng().fill(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}
