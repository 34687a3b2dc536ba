mod announcements;
mod config;
mod error;
mod members;
mod sessions;

use axum::Router;
use std::sync::Arc;

use crate::auth::ServerSettings;
use crate::credentials::CredentialHasher;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    hasher: CredentialHasher,
    settings: Arc<ServerSettings>,
    rate_limit: Arc<RateLimitConfig>,
    no_signup: bool,
) -> Router {
    let sessions_state = sessions::SessionsState {
        db: db.clone(),
        jwt: jwt.clone(),
        hasher,
        settings: settings.clone(),
        rate_limit: rate_limit.clone(),
    };

    let members_state = members::MembersState {
        db: db.clone(),
        jwt: jwt.clone(),
        hasher,
        settings: settings.clone(),
        rate_limit,
        no_signup,
    };

    let announcements_state = announcements::AnnouncementsState {
        db: db.clone(),
        jwt: jwt.clone(),
        hasher,
        settings: settings.clone(),
    };

    let config_state = config::ConfigState {
        no_signup,
        jwt,
        db,
        hasher,
        settings,
    };

    Router::new()
        .nest("/sessions", sessions::router(sessions_state))
        .nest("/members", members::router(members_state))
        .nest("/announcements", announcements::router(announcements_state))
        .nest("/config", config::router(config_state))
}
