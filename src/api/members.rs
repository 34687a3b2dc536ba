//! Member management API endpoints.
//!
//! - POST `/` - Signup: create a pending resident and issue a session
//! - GET `/` - List all members (admin)
//! - PATCH `/{uuid}/status` - Approve, reject, or deactivate a member (admin)
//! - PATCH `/{uuid}/role` - Change a member's role (super admin)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{AdminOnly, Auth, ServerSettings, SuperAdminOnly, issue_session};
use crate::credentials::CredentialHasher;
use crate::db::{Database, MemberRole, MemberStatus};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_signup};

#[derive(Clone)]
pub struct MembersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub hasher: CredentialHasher,
    pub settings: Arc<ServerSettings>,
    pub rate_limit: Arc<RateLimitConfig>,
    pub no_signup: bool,
}

impl_has_auth_backend!(MembersState);

pub fn router(state: MembersState) -> Router {
    let admin_router = Router::new()
        .route("/", get(list_members))
        .route("/{uuid}/status", patch(set_member_status))
        .route("/{uuid}/role", patch(set_member_role))
        .with_state(state.clone());

    if state.no_signup {
        admin_router
    } else {
        let signup_router = Router::new()
            .route("/", post(signup))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(
                state.rate_limit.clone(),
                rate_limit_signup,
            ));

        Router::new().merge(admin_router).merge(signup_router)
    }
}

#[derive(Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
    full_name: String,
    unit: Option<String>,
}

#[derive(Serialize)]
struct SignupResponse {
    uuid: String,
    email: String,
    full_name: String,
    unit: Option<String>,
    role: MemberRole,
    status: MemberStatus,
}

/// Create a new pending resident and issue a session for it.
///
/// The account starts `pending`; the session lets the new member watch
/// their own approval status without logging in again.
async fn signup(
    State(state): State<MembersState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim();
    let full_name = payload.full_name.trim();
    let unit = payload.unit.as_deref().map(str::trim).filter(|u| !u.is_empty());

    if email.is_empty() {
        return Err(ApiError::bad_request("Email cannot be empty"));
    }
    if email.len() > 254 || !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    // bcrypt only reads the first 72 bytes; reject rather than truncate.
    if payload.password.len() > 72 {
        return Err(ApiError::bad_request(
            "Password cannot be longer than 72 characters",
        ));
    }
    if full_name.is_empty() {
        return Err(ApiError::bad_request("Full name cannot be empty"));
    }
    if full_name.len() > 100 {
        return Err(ApiError::bad_request(
            "Full name cannot be longer than 100 characters",
        ));
    }
    if let Some(unit) = unit {
        if unit.len() > 32 {
            return Err(ApiError::bad_request(
                "Unit cannot be longer than 32 characters",
            ));
        }
    }

    let existing = state
        .db
        .members()
        .get_by_email(email)
        .await
        .db_err("Failed to check email availability")?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = state
        .hasher
        .hash_password(&payload.password)
        .internal_err("Failed to hash password")?;

    let uuid = uuid::Uuid::new_v4().to_string();
    state
        .db
        .members()
        .create(&uuid, email, full_name, unit, Some(&password_hash))
        .await
        .db_err("Failed to create member")?;

    let session = issue_session(
        &state.jwt,
        &state.hasher,
        &state.db,
        &uuid,
        MemberRole::Resident,
        state.settings.secure_cookies,
    )
    .await
    .internal_err("Failed to issue session")?;

    Ok((
        StatusCode::CREATED,
        AppendHeaders([
            (SET_COOKIE, session.access_cookie),
            (SET_COOKIE, session.refresh_cookie),
        ]),
        Json(SignupResponse {
            uuid,
            email: email.to_string(),
            full_name: full_name.to_string(),
            unit: unit.map(str::to_string),
            role: MemberRole::Resident,
            status: MemberStatus::Pending,
        }),
    ))
}

/// List all members, oldest first.
async fn list_members(
    State(state): State<MembersState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let members = state.db.members().list().await.db_err("Failed to list members")?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "members": members }))))
}

#[derive(Deserialize)]
struct SetStatusRequest {
    status: MemberStatus,
}

/// Approve, reject, or deactivate a member.
///
/// Deactivation also revokes every live session the member holds, so the
/// lockout takes effect within one access token lifetime instead of
/// waiting out the refresh TTL.
async fn set_member_status(
    State(state): State<MembersState>,
    auth: Auth<AdminOnly>,
    Path(uuid): Path<String>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let member = state
        .db
        .members()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get member")?
        .ok_or_else(|| ApiError::not_found("Member not found"))?;

    if member.role == MemberRole::SuperAdmin && auth.member.role != MemberRole::SuperAdmin {
        return Err(ApiError::forbidden("Cannot modify a super admin"));
    }

    let updated = state
        .db
        .members()
        .set_status(&uuid, payload.status)
        .await
        .db_err("Failed to update member status")?;
    if !updated {
        return Err(ApiError::not_found("Member not found"));
    }

    if payload.status == MemberStatus::Deactivated {
        let revoked = state
            .db
            .refresh_tokens()
            .revoke_all_for_member(&uuid)
            .await
            .db_err("Failed to revoke member sessions")?;
        tracing::info!(member = %uuid, sessions = revoked, "deactivated member");
    }

    Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))))
}

#[derive(Deserialize)]
struct SetRoleRequest {
    role: MemberRole,
}

/// Change a member's role. The new role reaches existing sessions at
/// their next token rotation.
async fn set_member_role(
    State(state): State<MembersState>,
    _auth: Auth<SuperAdminOnly>,
    Path(uuid): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let updated = state
        .db
        .members()
        .set_role(&uuid, payload.role)
        .await
        .db_err("Failed to update member role")?;
    if !updated {
        return Err(ApiError::not_found("Member not found"));
    }

    Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))))
}
