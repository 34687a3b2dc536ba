#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use courtyard::{
    ServerConfig,
    auth::{IssuedSession, issue_session},
    create_app,
    credentials::CredentialHasher,
    db::{Database, MemberRole, MemberStatus},
    jwt::JwtConfig,
    rate_limit::RateLimitConfig,
};
use tower::ServiceExt;

pub const TEST_ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const TEST_REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";
pub const TEST_REFRESH_DAYS: u64 = 14;

/// Cheap bcrypt cost so tests stay fast.
pub const TEST_HASH_COST: u32 = 4;

pub const TEST_PASSWORD: &str = "correct horse battery";

pub fn test_hasher() -> CredentialHasher {
    CredentialHasher::new(TEST_HASH_COST)
}

pub fn test_jwt() -> JwtConfig {
    JwtConfig::new(
        TEST_ACCESS_SECRET,
        TEST_REFRESH_SECRET,
        TEST_REFRESH_DAYS * 24 * 60 * 60,
    )
}

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: TEST_ACCESS_SECRET.to_vec(),
        refresh_secret: TEST_REFRESH_SECRET.to_vec(),
        refresh_token_days: TEST_REFRESH_DAYS,
        hasher: test_hasher(),
        rate_limit: RateLimitConfig::unlimited(),
        secure_cookies: false,
        no_signup: false,
    }
}

/// Create a test app and return (app, db, jwt_config).
pub async fn create_test_app() -> (Router, Database, JwtConfig) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let app = create_app(&test_config(db.clone()));
    (app, db, test_jwt())
}

/// Create a test app with signups disabled.
pub async fn create_test_app_no_signup() -> (Router, Database, JwtConfig) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        no_signup: true,
        ..test_config(db.clone())
    };
    (create_app(&config), db, test_jwt())
}

/// Create a test app with the production rate limit quotas.
pub async fn create_test_app_rate_limited() -> (Router, Database, JwtConfig) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        rate_limit: RateLimitConfig::new(),
        ..test_config(db.clone())
    };
    (create_app(&config), db, test_jwt())
}

/// Create an approved member with the test password. Returns the UUID.
pub async fn create_member(db: &Database, email: &str, role: MemberRole) -> String {
    let uuid = uuid::Uuid::new_v4().to_string();
    let hash = test_hasher()
        .hash_password(TEST_PASSWORD)
        .expect("Failed to hash test password");
    db.members()
        .create(&uuid, email, "Test Member", Some("3A"), Some(&hash))
        .await
        .expect("Failed to create test member");
    db.members()
        .set_status(&uuid, MemberStatus::Approved)
        .await
        .expect("Failed to approve test member");
    if role != MemberRole::Resident {
        db.members()
            .set_role(&uuid, role)
            .await
            .expect("Failed to set test member role");
    }
    uuid
}

/// Create an approved member and issue a session for it directly against
/// the store, bypassing the login endpoint.
pub async fn create_authenticated_member(
    db: &Database,
    jwt: &JwtConfig,
    email: &str,
    role: MemberRole,
) -> (String, IssuedSession) {
    let uuid = create_member(db, email, role).await;
    let session = issue_session(jwt, &test_hasher(), db, &uuid, role, false)
        .await
        .expect("Failed to issue test session");
    (uuid, session)
}

/// Issue an additional session for an existing member.
pub async fn issue_extra_session(
    db: &Database,
    jwt: &JwtConfig,
    uuid: &str,
    role: MemberRole,
) -> IssuedSession {
    issue_session(jwt, &test_hasher(), db, uuid, role, false)
        .await
        .expect("Failed to issue test session")
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!("accessToken={}; refreshToken={}", access_token, refresh_token)
}

pub fn refresh_cookie_only(refresh_token: &str) -> String {
    format!("refreshToken={}", refresh_token)
}

pub fn access_cookie_only(access_token: &str) -> String {
    format!("accessToken={}", access_token)
}

/// Extract Set-Cookie headers from a response.
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check if cookies contain a token being cleared (Max-Age=0).
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && c.contains("Max-Age=0"))
}

/// Check if cookies contain a new (non-cleared) access token.
pub fn has_new_access_token(cookies: &[String]) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with("accessToken=") && !c.contains("Max-Age=0"))
}

/// Pull the raw token value out of a Set-Cookie header for `name`.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|c| {
        let rest = c.strip_prefix(&prefix)?;
        let value = rest.split(';').next()?;
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}

/// Read a response body as raw bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body")
        .to_vec()
}

/// Build a GET request with a cookie header.
pub fn get_with_cookies(uri: &str, cookies: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("cookie", cookies)
        .body(Body::empty())
        .unwrap()
}

/// Build a GET request with no credentials.
pub fn get_bare(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Build a JSON POST request, optionally with a cookie header.
pub fn post_json(uri: &str, cookies: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header("cookie", cookies);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// POST /api/sessions/login and return the response.
pub async fn login_response(app: Router, email: &str, password: &str) -> Response<Body> {
    app.oneshot(post_json(
        "/api/sessions/login",
        None,
        serde_json::json!({ "email": email, "password": password }),
    ))
    .await
    .unwrap()
}

/// Log in and return the (access, refresh) token values from the cookies.
pub async fn login(app: Router, email: &str, password: &str) -> (String, String) {
    let response = login_response(app, email, password).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK, "login failed");
    let cookies = extract_set_cookies(&response);
    let access = cookie_value(&cookies, "accessToken").expect("no access token cookie");
    let refresh = cookie_value(&cookies, "refreshToken").expect("no refresh token cookie");
    (access, refresh)
}
