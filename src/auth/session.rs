//! Session issuing and refresh-token matching.
//!
//! A session is an access+refresh token pair. Issuing one persists a single
//! hashed refresh record; prior sessions for the member stay live, so
//! multiple devices can hold sessions at once.

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, token_cookie};
use crate::credentials::CredentialHasher;
use crate::db::{Database, MemberRole, RefreshTokenRecord};
use crate::jwt::{JwtConfig, JwtError, SignedToken};

/// A freshly minted token pair with its transport cookies.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access: SignedToken,
    pub refresh: SignedToken,
    pub access_cookie: String,
    pub refresh_cookie: String,
}

/// Errors that can occur while issuing a session.
#[derive(Debug)]
pub enum SessionError {
    Jwt(JwtError),
    Hash(bcrypt::BcryptError),
    Db(sqlx::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Jwt(e) => write!(f, "Failed to sign token: {}", e),
            SessionError::Hash(e) => write!(f, "Failed to hash refresh token: {}", e),
            SessionError::Db(e) => write!(f, "Failed to persist refresh token: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

/// Mint an access+refresh pair for an already-authenticated member,
/// persist the hashed refresh token, and build both cookies.
pub async fn issue_session(
    jwt: &JwtConfig,
    hasher: &CredentialHasher,
    db: &Database,
    member_uuid: &str,
    role: MemberRole,
    secure_cookies: bool,
) -> Result<IssuedSession, SessionError> {
    let access = jwt.sign_access(member_uuid, role).map_err(SessionError::Jwt)?;
    let refresh = jwt.sign_refresh(member_uuid, role).map_err(SessionError::Jwt)?;

    let token_hash = hasher.hash_token(&refresh.token).map_err(SessionError::Hash)?;
    let record_uuid = uuid::Uuid::new_v4().to_string();
    db.refresh_tokens()
        .issue(&record_uuid, member_uuid, &token_hash, refresh.expires_at)
        .await
        .map_err(SessionError::Db)?;

    let access_cookie = token_cookie(ACCESS_COOKIE_NAME, &access.token, access.duration, secure_cookies);
    let refresh_cookie =
        token_cookie(REFRESH_COOKIE_NAME, &refresh.token, refresh.duration, secure_cookies);

    Ok(IssuedSession {
        access,
        refresh,
        access_cookie,
        refresh_cookie,
    })
}

/// Find the live record a raw refresh token belongs to by running the hash
/// compare against each of the member's live records. Only hashes are
/// stored, so there is no lookup by value; this scan is the only way in.
pub async fn match_live_record(
    db: &Database,
    hasher: &CredentialHasher,
    member_uuid: &str,
    raw_token: &str,
) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
    let live = db.refresh_tokens().find_live(member_uuid).await?;
    Ok(live
        .into_iter()
        .find(|record| hasher.verify_token(raw_token, &record.token_hash)))
}
