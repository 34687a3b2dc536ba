pub mod api;
pub mod auth;
pub mod cli;
pub mod credentials;
pub mod db;
pub mod jwt;
pub mod pages;
pub mod rate_limit;

use api::create_api_router;
use auth::{ServerSettings, add_access_token_cookie};
use axum::{Router, middleware};
use credentials::CredentialHasher;
use db::Database;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Signing secret for access tokens
    pub access_secret: Vec<u8>,
    /// Signing secret for refresh tokens (independent of the access secret)
    pub refresh_secret: Vec<u8>,
    /// Refresh token lifetime in days
    pub refresh_token_days: u64,
    /// bcrypt hasher for passwords and refresh tokens at rest
    pub hasher: CredentialHasher,
    /// Rate limiters for the credential endpoints
    pub rate_limit: RateLimitConfig,
    /// Whether to set the Secure flag on cookies (true when the public
    /// origin is HTTPS)
    pub secure_cookies: bool,
    /// Whether new member signups are disabled
    pub no_signup: bool,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(
        &config.access_secret,
        &config.refresh_secret,
        config.refresh_token_days * 24 * 60 * 60,
    ));
    let settings = Arc::new(ServerSettings {
        secure_cookies: config.secure_cookies,
        login_path: pages::LOGIN_PATH.to_string(),
    });
    let rate_limit = Arc::new(config.rate_limit.clone());

    let api_router = create_api_router(
        config.db.clone(),
        jwt.clone(),
        config.hasher,
        settings.clone(),
        rate_limit,
        config.no_signup,
    )
    .layer(middleware::from_fn(add_access_token_cookie));

    let pages_router = pages::router(pages::PagesState {
        db: config.db.clone(),
        jwt,
        hasher: config.hasher,
        settings,
    })
    .layer(middleware::from_fn(add_access_token_cookie));

    Router::new().nest("/api", api_router).merge(pages_router)
}

/// Run the server on the given listener. Blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
