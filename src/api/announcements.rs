//! Announcements API.
//!
//! The minimal protected resource behind the authorization gate: any
//! authenticated member may read, admins write.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{AdminOnly, Auth, ServerSettings};
use crate::credentials::CredentialHasher;
use crate::db::{Announcement, Database};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct AnnouncementsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub hasher: CredentialHasher,
    pub settings: Arc<ServerSettings>,
}

impl_has_auth_backend!(AnnouncementsState);

pub fn router(state: AnnouncementsState) -> Router {
    Router::new()
        .route("/", get(list_announcements))
        .route("/", post(create_announcement))
        .route("/{uuid}", delete(delete_announcement))
        .with_state(state)
}

#[derive(Serialize)]
struct ListAnnouncementsResponse {
    announcements: Vec<Announcement>,
}

/// List announcements, newest first. Any authenticated member.
async fn list_announcements(
    State(state): State<AnnouncementsState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let announcements = state
        .db
        .announcements()
        .list()
        .await
        .db_err("Failed to list announcements")?;

    Ok((StatusCode::OK, Json(ListAnnouncementsResponse { announcements })))
}

#[derive(Deserialize)]
struct CreateAnnouncementRequest {
    title: String,
    body: String,
}

#[derive(Serialize)]
struct CreateAnnouncementResponse {
    uuid: String,
}

/// Create an announcement. Admins only.
async fn create_announcement(
    State(state): State<AnnouncementsState>,
    auth: Auth<AdminOnly>,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title cannot be empty"));
    }
    if title.len() > 200 {
        return Err(ApiError::bad_request(
            "Title cannot be longer than 200 characters",
        ));
    }

    let uuid = uuid::Uuid::new_v4().to_string();
    state
        .db
        .announcements()
        .create(&uuid, &auth.member.uuid, title, &payload.body)
        .await
        .db_err("Failed to create announcement")?;

    Ok((StatusCode::CREATED, Json(CreateAnnouncementResponse { uuid })))
}

/// Delete an announcement. Admins only.
async fn delete_announcement(
    State(state): State<AnnouncementsState>,
    _auth: Auth<AdminOnly>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let deleted = state
        .db
        .announcements()
        .delete_by_uuid(&uuid)
        .await
        .db_err("Failed to delete announcement")?;
    if !deleted {
        return Err(ApiError::not_found("Announcement not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
