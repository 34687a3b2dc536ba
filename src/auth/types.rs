//! Authentication identity types.

use crate::db::MemberRole;
use crate::jwt::Claims;

/// Identity injected into handlers by the authorization gate.
///
/// Handlers receive exactly this and must not re-derive identity from
/// cookies or headers themselves.
#[derive(Debug, Clone)]
pub struct AuthenticatedMember {
    /// Member UUID from the token subject claim
    pub uuid: String,
    /// Role at token issue time
    pub role: MemberRole,
}

impl From<Claims> for AuthenticatedMember {
    fn from(claims: Claims) -> Self {
        Self {
            uuid: claims.sub,
            role: claims.role,
        }
    }
}
