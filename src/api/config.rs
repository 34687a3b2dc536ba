//! Public configuration endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{OptionalAuth, ServerSettings};
use crate::credentials::CredentialHasher;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// Version embedded at compile time from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct ConfigState {
    pub no_signup: bool,
    pub jwt: Arc<JwtConfig>,
    pub db: Database,
    pub hasher: CredentialHasher,
    pub settings: Arc<ServerSettings>,
}

impl_has_auth_backend!(ConfigState);

#[derive(Serialize)]
struct ConfigResponse {
    no_signup: bool,
    authenticated: bool,
    version: &'static str,
}

pub fn router(state: ConfigState) -> Router {
    Router::new().route("/", get(get_config)).with_state(state)
}

/// Frontend bootstrap probe. `authenticated` reflects whether the request
/// carried a live session; the probe never rejects.
async fn get_config(
    State(state): State<ConfigState>,
    OptionalAuth(member): OptionalAuth,
) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        no_signup: state.no_signup,
        authenticated: member.is_some(),
        version: VERSION,
    })
}
