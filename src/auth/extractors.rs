//! Axum extractors for authentication.
//!
//! The gate runs in two phases. A live access token authenticates the
//! request from its claims alone, with no storage access. Only when the
//! access token is missing or dead does the gate fall back to the refresh
//! token, which must verify against the signing key *and* match a live
//! stored record before a replacement access token is minted mid-request.

use std::cell::RefCell;
use std::convert::Infallible;
use std::marker::PhantomData;

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie, token_cookie};
use super::errors::{ApiAuthError, AuthErrorKind, PageAuthError};
use super::session::match_live_record;
use super::state::HasAuthBackend;
use super::types::AuthenticatedMember;
use crate::db::MemberRole;

tokio::task_local! {
    /// Task-local slot for a replacement access token cookie.
    /// Carries the cookie from the extractor to the response middleware.
    pub static NEW_ACCESS_TOKEN_COOKIE: RefCell<Option<String>>;
}

/// Core authentication logic shared by every extractor.
async fn authenticate_request<S>(
    parts: &Parts,
    state: &S,
) -> Result<AuthenticatedMember, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    // Fast path: a valid access token is trusted as-is.
    if let Some(access_token) = get_cookie(&parts.headers, ACCESS_COOKIE_NAME) {
        if let Some(claims) = state.jwt().verify_access(access_token) {
            return Ok(claims.into());
        }
    }

    // Access token missing or dead. Fall back to the refresh token.
    let refresh_token =
        get_cookie(&parts.headers, REFRESH_COOKIE_NAME).ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = state
        .jwt()
        .verify_refresh(refresh_token)
        .ok_or(AuthErrorKind::NotAuthenticated)?;

    // A refresh token with a valid signature is still only as good as its
    // stored record. Logout and admin revocation kill the record, so this
    // check is what makes refresh tokens revocable.
    let record = match_live_record(state.db(), state.hasher(), &claims.sub, refresh_token)
        .await
        .map_err(|e| {
            tracing::error!("failed to scan refresh tokens: {e}");
            AuthErrorKind::Internal
        })?;
    if record.is_none() {
        // Cryptographically valid but unmatched: either the record aged
        // out, or this token was already rotated and is being replayed.
        tracing::warn!(member = %claims.sub, "refresh token matches no live session");
        return Err(AuthErrorKind::NotAuthenticated);
    }

    // Mint a replacement access token from the refresh claims. The refresh
    // token itself is not rotated here; only the dedicated refresh endpoint
    // does that.
    let signed = state.jwt().sign_access(&claims.sub, claims.role).map_err(|e| {
        tracing::error!("failed to sign access token: {e}");
        AuthErrorKind::Internal
    })?;

    let new_cookie = token_cookie(
        ACCESS_COOKIE_NAME,
        &signed.token,
        signed.duration,
        state.settings().secure_cookies,
    );
    let _ = NEW_ACCESS_TOKEN_COOKIE.try_with(|cell| {
        cell.borrow_mut().replace(new_cookie);
    });

    Ok(claims.into())
}

/// A role constraint checked after authentication succeeds.
pub trait RoleConstraint {
    fn allows(role: MemberRole) -> bool;
}

/// Accepts any authenticated member.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_role: MemberRole) -> bool {
        true
    }
}

/// Accepts admins and super admins only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: MemberRole) -> bool {
        role.is_admin()
    }
}

/// Accepts super admins only.
pub struct SuperAdminOnly;

impl RoleConstraint for SuperAdminOnly {
    fn allows(role: MemberRole) -> bool {
        role == MemberRole::SuperAdmin
    }
}

/// Extractor for API endpoints that require authentication.
///
/// Validates the access token (short-lived, stateless). If that fails,
/// attempts a silent renewal using the refresh token. Rejections are JSON,
/// never redirects. The role constraint defaults to [`AnyRole`]; use
/// `Auth<AdminOnly>` for admin-only handlers.
pub struct Auth<C = AnyRole> {
    pub member: AuthenticatedMember,
    _constraint: PhantomData<C>,
}

impl<S, C> FromRequestParts<S> for Auth<C>
where
    S: HasAuthBackend + Send + Sync,
    C: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secure_cookies = state.settings().secure_cookies;
        let member = authenticate_request(parts, state)
            .await
            .map_err(|kind| ApiAuthError::new(kind, secure_cookies))?;

        if !C::allows(member.role) {
            return Err(ApiAuthError::new(
                AuthErrorKind::InsufficientRole,
                secure_cookies,
            ));
        }

        Ok(Auth {
            member,
            _constraint: PhantomData,
        })
    }
}

/// Optional authentication extractor. Never fails; handlers get
/// `Some(member)` when the request carries a live session and `None`
/// otherwise.
pub struct OptionalAuth(pub Option<AuthenticatedMember>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(authenticate_request(parts, state).await.ok()))
    }
}

/// Extractor for page endpoints that require authentication.
///
/// On failure, redirects to the login page WITHOUT clearing cookies, so a
/// refresh token that is merely mid-renewal keeps working on the API calls
/// the login page makes next.
pub struct PageAuth(pub AuthenticatedMember);

impl<S> FromRequestParts<S> for PageAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = PageAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(PageAuth)
            .map_err(|_| PageAuthError {
                login_path: state.settings().login_path.clone(),
            })
    }
}

/// Middleware that appends a replacement access token cookie staged by the
/// extractors during silent renewal. Must be layered on every router whose
/// routes authenticate, or renewed tokens never reach the client.
pub async fn add_access_token_cookie(request: Request, next: Next) -> Response {
    NEW_ACCESS_TOKEN_COOKIE
        .scope(RefCell::new(None), async move {
            let mut response = next.run(request).await;
            let new_cookie = NEW_ACCESS_TOKEN_COOKIE.with(|cell| cell.borrow_mut().take());
            if let Some(cookie) = new_cookie {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    response.headers_mut().append(SET_COOKIE, value);
                }
            }
            response
        })
        .await
}
