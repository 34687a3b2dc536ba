//! Session management API endpoints.
//!
//! - POST `/login` - Authenticate with email and password, set token cookies
//! - POST `/refresh` - Rotate the refresh token, mint a fresh token pair
//! - POST `/logout` - Revoke the presented refresh token and clear cookies
//! - GET `/me` - Profile of the member behind the current session
//! - GET `/verify` - Lightweight auth probe
//! - GET `/` - List live sessions for the current member
//! - DELETE `/{uuid}` - Revoke a specific session (own session or admin)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, REFRESH_COOKIE_NAME, ServerSettings, clear_cookie, get_cookie,
    issue_session, match_live_record,
};
use crate::credentials::CredentialHasher;
use crate::db::{Database, Member, MemberRole, MemberStatus, RefreshTokenSummary};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub hasher: CredentialHasher,
    pub settings: Arc<ServerSettings>,
    pub rate_limit: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(SessionsState);

pub fn router(state: SessionsState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/", get(list_sessions))
        .route("/me", get(current_member))
        .route("/verify", get(verify_session))
        .route("/refresh", post(refresh_session))
        .route("/logout", post(logout))
        .route("/{uuid}", delete(revoke_session))
        .with_state(state)
        .merge(login_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct MemberInfo {
    uuid: String,
    email: String,
    full_name: String,
    unit: Option<String>,
    role: MemberRole,
    status: MemberStatus,
}

impl From<Member> for MemberInfo {
    fn from(member: Member) -> Self {
        Self {
            uuid: member.uuid,
            email: member.email,
            full_name: member.full_name,
            unit: member.unit,
            role: member.role,
            status: member.status,
        }
    }
}

/// Authenticate with email and password.
///
/// Missing accounts, accounts without a password, and wrong passwords all
/// produce the same 401 so the endpoint cannot be used to enumerate
/// members. Rejected and deactivated accounts get a 403 only after the
/// password verified, for the same reason.
async fn login(
    State(state): State<SessionsState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();

    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let member = state
        .db
        .members()
        .get_by_email(email)
        .await
        .db_err("Failed to look up member")?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let password_hash = member
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !state.hasher.verify_password(&payload.password, password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    // Pending members may hold a session; they just see an empty community
    // until approved. Rejected and deactivated members may not.
    match member.status {
        MemberStatus::Rejected => return Err(ApiError::forbidden("Account has been rejected")),
        MemberStatus::Deactivated => {
            return Err(ApiError::forbidden("Account has been deactivated"));
        }
        MemberStatus::Pending | MemberStatus::Approved => {}
    }

    let session = issue_session(
        &state.jwt,
        &state.hasher,
        &state.db,
        &member.uuid,
        member.role,
        state.settings.secure_cookies,
    )
    .await
    .internal_err("Failed to issue session")?;

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, session.access_cookie),
            (SET_COOKIE, session.refresh_cookie),
        ]),
        Json(MemberInfo::from(member)),
    ))
}

#[derive(Deserialize)]
struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

/// Rotate the refresh token.
///
/// The presented token must verify against the signing key and match a
/// live stored record. The matched record is revoked atomically before the
/// replacement pair is minted, so a token can be exchanged exactly once:
/// of two racing calls with the same token, one wins and the other gets
/// the same 401 as a forged token.
async fn refresh_session(
    State(state): State<SessionsState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let cookie_token = get_cookie(&headers, REFRESH_COOKIE_NAME).map(str::to_string);
    let body_token = body.and_then(|Json(payload)| payload.refresh_token);
    let raw_token = cookie_token
        .or(body_token)
        .ok_or_else(|| ApiError::bad_request("No refresh token provided"))?;

    let claims = state
        .jwt
        .verify_refresh(&raw_token)
        .ok_or_else(|| ApiError::unauthorized("Invalid or revoked refresh token"))?;

    let record = match_live_record(&state.db, &state.hasher, &claims.sub, &raw_token)
        .await
        .db_err("Failed to scan refresh tokens")?
        .ok_or_else(|| ApiError::unauthorized("Invalid or revoked refresh token"))?;

    // Burn the old record before minting anything. A lost race means
    // another request already exchanged this token.
    let consumed = state
        .db
        .refresh_tokens()
        .consume(record.id)
        .await
        .db_err("Failed to consume refresh token")?;
    if !consumed {
        return Err(ApiError::unauthorized("Invalid or revoked refresh token"));
    }

    let member = state
        .db
        .members()
        .get_by_uuid(&claims.sub)
        .await
        .db_err("Failed to look up member")?
        .ok_or_else(|| ApiError::unauthorized("Invalid or revoked refresh token"))?;

    match member.status {
        MemberStatus::Rejected => return Err(ApiError::forbidden("Account has been rejected")),
        MemberStatus::Deactivated => {
            return Err(ApiError::forbidden("Account has been deactivated"));
        }
        MemberStatus::Pending | MemberStatus::Approved => {}
    }

    // Role comes fresh from the database, so promotions and demotions take
    // effect at the next rotation rather than waiting out the refresh TTL.
    let session = issue_session(
        &state.jwt,
        &state.hasher,
        &state.db,
        &member.uuid,
        member.role,
        state.settings.secure_cookies,
    )
    .await
    .internal_err("Failed to issue session")?;

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, session.access_cookie),
            (SET_COOKIE, session.refresh_cookie),
        ]),
        Json(MemberInfo::from(member)),
    ))
}

/// Logout - revoke the presented refresh token and clear both cookies.
///
/// Best-effort: a missing, forged, or already-revoked token still gets the
/// cookies cleared and a 200. Other sessions of the same member stay live.
async fn logout(State(state): State<SessionsState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(refresh_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        if let Some(claims) = state.jwt.verify_refresh(refresh_token) {
            if let Ok(Some(record)) =
                match_live_record(&state.db, &state.hasher, &claims.sub, refresh_token).await
            {
                let _ = state.db.refresh_tokens().revoke(record.id).await;
            }
        }
    }

    let secure = state.settings.secure_cookies;
    (
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, secure)),
            (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, secure)),
        ]),
        Json(serde_json::json!({ "success": true })),
    )
}

/// Verify that the current session is live.
/// Returns 200 if authenticated, 401 if not. Lightweight probe for the
/// frontend to check auth status (e.g. on bfcache restore).
async fn verify_session(_auth: Auth) -> impl IntoResponse {
    StatusCode::OK
}

/// Profile of the member behind the current session.
async fn current_member(
    State(state): State<SessionsState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let member = state
        .db
        .members()
        .get_by_uuid(&auth.member.uuid)
        .await
        .db_err("Failed to look up member")?
        .ok_or_else(|| ApiError::not_found("Member not found"))?;

    Ok((StatusCode::OK, Json(MemberInfo::from(member))))
}

#[derive(Serialize)]
struct ListSessionsResponse {
    sessions: Vec<RefreshTokenSummary>,
}

/// List live sessions for the current member.
async fn list_sessions(
    State(state): State<SessionsState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let records = state
        .db
        .refresh_tokens()
        .find_live(&auth.member.uuid)
        .await
        .db_err("Failed to list sessions")?;

    let sessions = records.into_iter().map(RefreshTokenSummary::from).collect();

    Ok((StatusCode::OK, Json(ListSessionsResponse { sessions })))
}

#[derive(Serialize)]
struct RevokeResponse {
    revoked: bool,
}

/// Revoke a specific session by record UUID.
/// Members can revoke their own sessions, admins can revoke any.
async fn revoke_session(
    State(state): State<SessionsState>,
    auth: Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let record = state
        .db
        .refresh_tokens()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get session")?;

    if let Some(record) = record {
        if record.member_uuid != auth.member.uuid && !auth.member.role.is_admin() {
            return Err(ApiError::forbidden("Cannot revoke another member's session"));
        }

        let revoked = state
            .db
            .refresh_tokens()
            .revoke(record.id)
            .await
            .db_err("Failed to revoke session")?;

        Ok((StatusCode::OK, Json(RevokeResponse { revoked })))
    } else {
        // Already revoked and expired out, or never existed.
        Ok((StatusCode::OK, Json(RevokeResponse { revoked: false })))
    }
}
