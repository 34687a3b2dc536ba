//! Authentication state traits and macro.

use crate::credentials::CredentialHasher;
use crate::db::Database;
use crate::jwt::JwtConfig;

/// Runtime settings the auth extractors need beyond keys and storage.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Set the Secure attribute on all auth cookies.
    pub secure_cookies: bool,
    /// Where page requests are redirected when authentication fails.
    pub login_path: String,
}

/// Trait for router state types that back the authorization gate.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
    fn hasher(&self) -> &CredentialHasher;
    fn settings(&self) -> &ServerSettings;
}

/// Implement [`HasAuthBackend`] for a state struct with the standard fields.
///
/// The struct must have these fields:
/// - `db: Database`
/// - `jwt: Arc<JwtConfig>`
/// - `hasher: CredentialHasher`
/// - `settings: Arc<ServerSettings>`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub jwt: Arc<JwtConfig>,
///     pub hasher: CredentialHasher,
///     pub settings: Arc<ServerSettings>,
///     // ... other fields
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn hasher(&self) -> &$crate::credentials::CredentialHasher {
                &self.hasher
            }
            fn settings(&self) -> &$crate::auth::ServerSettings {
                &self.settings
            }
        }
    };
}
