//! Signing and verification for the two token classes.
//!
//! Access and refresh tokens are signed with separate symmetric keys, so a
//! leaked key of one class cannot forge the other. Verification never
//! returns an error value: anything short of a fully valid token of the
//! expected class comes back as `None` and callers must branch on it.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::MemberRole;

/// Token class discriminator carried in the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token (15 minutes), stateless.
    Access,
    /// Long-lived refresh token, tracked hashed in the database.
    Refresh,
}

/// Claims carried by both token classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (member UUID)
    pub sub: String,
    /// Member role at issue time
    pub role: MemberRole,
    /// Token class
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Result of signing a token.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The compact JWT string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Key material and policy for token operations.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    refresh_duration_secs: u64,
}

impl JwtConfig {
    /// Create a configuration from the two class secrets and the refresh
    /// token lifetime.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8], refresh_duration_secs: u64) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            refresh_duration_secs,
        }
    }

    /// Configured refresh token lifetime in seconds.
    pub fn refresh_duration_secs(&self) -> u64 {
        self.refresh_duration_secs
    }

    /// Sign an access token for a member.
    pub fn sign_access(&self, member_uuid: &str, role: MemberRole) -> Result<SignedToken, JwtError> {
        self.sign(
            member_uuid,
            role,
            TokenType::Access,
            ACCESS_TOKEN_DURATION_SECS,
            &self.access_encoding,
        )
    }

    /// Sign a refresh token for a member.
    pub fn sign_refresh(
        &self,
        member_uuid: &str,
        role: MemberRole,
    ) -> Result<SignedToken, JwtError> {
        self.sign(
            member_uuid,
            role,
            TokenType::Refresh,
            self.refresh_duration_secs,
            &self.refresh_encoding,
        )
    }

    fn sign(
        &self,
        member_uuid: &str,
        role: MemberRole,
        token_type: TokenType,
        duration: u64,
        key: &EncodingKey,
    ) -> Result<SignedToken, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::TimeError)?
            .as_secs();

        let exp = now + duration;

        let claims = Claims {
            sub: member_uuid.to_string(),
            role,
            token_type,
            iat: now,
            exp,
        };

        let token =
            jsonwebtoken::encode(&Header::default(), &claims, key).map_err(JwtError::Encoding)?;

        Ok(SignedToken {
            token,
            issued_at: now,
            expires_at: exp,
            duration,
        })
    }

    /// Verify an access token. Returns `None` for a bad signature, a
    /// tampered payload, expiry, or a token of the wrong class.
    pub fn verify_access(&self, token: &str) -> Option<Claims> {
        Self::verify(token, TokenType::Access, &self.access_decoding)
    }

    /// Verify a refresh token against the refresh secret. Same silent
    /// failure contract as [`verify_access`](Self::verify_access).
    pub fn verify_refresh(&self, token: &str) -> Option<Claims> {
        Self::verify(token, TokenType::Refresh, &self.refresh_decoding)
    }

    fn verify(token: &str, expected: TokenType, key: &DecodingKey) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<Claims>(token, key, &validation).ok()?;

        if token_data.claims.token_type != expected {
            return None;
        }

        Some(token_data.claims)
    }
}

/// Errors that can occur while signing tokens.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}
