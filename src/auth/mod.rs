//! JWT authentication with role-based access control.
//!
//! Dual-token system: short-lived access tokens (15 min, stateless) and
//! long-lived refresh tokens (configurable, database-tracked as bcrypt
//! hashes). Access tokens are silently renewed by the extractors when
//! expired, provided the refresh token still matches a live stored record.

mod cookie;
mod errors;
mod extractors;
mod session;
mod state;
mod types;

pub use cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, token_cookie};
pub use errors::{ApiAuthError, PageAuthError};
pub use extractors::{
    AdminOnly, AnyRole, Auth, NEW_ACCESS_TOKEN_COOKIE, OptionalAuth, PageAuth, RoleConstraint,
    SuperAdminOnly, add_access_token_cookie,
};
pub use session::{IssuedSession, SessionError, issue_session, match_live_record};
pub use state::{HasAuthBackend, ServerSettings};
pub use types::AuthenticatedMember;
