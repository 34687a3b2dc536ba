//! One-way hashing for passwords and refresh-token-at-rest values.
//!
//! Both go through bcrypt so a match can only be established by running the
//! verify function against a candidate. Token values are digested with
//! SHA-256 first: bcrypt reads at most 72 bytes of input, and serialized
//! tokens for one subject share a much longer common prefix.

use sha2::{Digest, Sha256};

/// Bcrypt work factor used by production config. Tests inject a lower cost.
pub const DEFAULT_HASH_COST: u32 = bcrypt::DEFAULT_COST;

/// Bcrypt wrapper with an injectable work factor.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash an account password.
    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, self.cost)
    }

    /// Check a password against a stored hash. Malformed stored hashes
    /// count as a non-match rather than an error.
    pub fn verify_password(&self, password: &str, hashed: &str) -> bool {
        bcrypt::verify(password, hashed).unwrap_or(false)
    }

    /// Hash a refresh token for storage. The output is salted per
    /// invocation, so the same token hashes to a different value each time.
    pub fn hash_token(&self, token: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(digest_token(token), self.cost)
    }

    /// Check a raw refresh token against a stored hash.
    pub fn verify_token(&self, token: &str, hashed: &str) -> bool {
        bcrypt::verify(digest_token(token), hashed).unwrap_or(false)
    }
}

/// SHA-256 hex digest of the raw token, used as the bcrypt input.
fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
