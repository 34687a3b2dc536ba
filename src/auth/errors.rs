//! Authentication error types.
//!
//! Every authentication failure collapses into one of two outward shapes:
//! a JSON 401/403/500 for API routes, or a redirect to the login page for
//! page routes. Missing, malformed, expired, and revoked tokens are not
//! distinguishable from each other at the HTTP boundary.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie};

/// Internal auth error kind used by the core authentication logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AuthErrorKind {
    /// Any token failure: missing, bad signature, expired, unmatched, revoked.
    NotAuthenticated,
    /// Authenticated but the role constraint rejected the member.
    InsufficientRole,
    /// Storage or signing failure while authenticating.
    Internal,
}

/// API authentication error. Returns JSON, and clears both token cookies
/// when the session itself is dead.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
    pub(super) secure_cookies: bool,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind, secure_cookies: bool) -> Self {
        Self {
            kind,
            secure_cookies,
        }
    }

    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self.kind {
            AuthErrorKind::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Authentication required",
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
            AuthErrorKind::Internal => "Internal error",
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use axum::http::HeaderValue;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let mut response = (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response();

        // A dead session takes its cookies with it. Role and internal
        // failures leave the (valid) session cookies alone.
        if self.kind == AuthErrorKind::NotAuthenticated {
            let headers = response.headers_mut();
            for cookie in [
                clear_cookie(ACCESS_COOKIE_NAME, self.secure_cookies),
                clear_cookie(REFRESH_COOKIE_NAME, self.secure_cookies),
            ] {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }

        response
    }
}

/// Page authentication error. Redirects to login without clearing cookies,
/// so a live refresh token keeps working on subsequent API calls.
#[derive(Debug)]
pub struct PageAuthError {
    pub login_path: String,
}

impl IntoResponse for PageAuthError {
    fn into_response(self) -> Response {
        axum::response::Redirect::temporary(&self.login_path).into_response()
    }
}
