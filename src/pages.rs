//! Page routes.
//!
//! Minimal HTML shells; the real frontend is served elsewhere. `/login` is
//! public and bounces already-authenticated visitors to the dashboard.
//! `/dashboard` requires a live session and bounces everyone else to
//! `/login` without touching their cookies, so a session that merely needs
//! renewal survives the round trip.

use axum::{
    Router,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use std::sync::Arc;

use crate::auth::{OptionalAuth, PageAuth, ServerSettings};
use crate::credentials::CredentialHasher;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

const LOGIN_PAGE: &str = concat!(
    "<!DOCTYPE html>\n",
    "<html lang=\"en\">\n",
    "<head><meta charset=\"utf-8\"><title>Sign in - Courtyard</title></head>\n",
    "<body><div id=\"login-root\"></div></body>\n",
    "</html>\n",
);

const DASHBOARD_PAGE: &str = concat!(
    "<!DOCTYPE html>\n",
    "<html lang=\"en\">\n",
    "<head><meta charset=\"utf-8\"><title>Courtyard</title></head>\n",
    "<body><div id=\"app-root\"></div></body>\n",
    "</html>\n",
);

#[derive(Clone)]
pub struct PagesState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub hasher: CredentialHasher,
    pub settings: Arc<ServerSettings>,
}

impl_has_auth_backend!(PagesState);

pub fn router(state: PagesState) -> Router {
    Router::new()
        .route("/", get(Redirect::temporary(LOGIN_PATH)))
        .route(LOGIN_PATH, get(login_page))
        .route(DASHBOARD_PATH, get(dashboard_page))
        .route(&format!("{DASHBOARD_PATH}/{{*path}}"), get(dashboard_page))
        .with_state(state)
}

async fn login_page(OptionalAuth(member): OptionalAuth) -> Response {
    if member.is_some() {
        Redirect::temporary(DASHBOARD_PATH).into_response()
    } else {
        Html(LOGIN_PAGE).into_response()
    }
}

async fn dashboard_page(_auth: PageAuth) -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}
