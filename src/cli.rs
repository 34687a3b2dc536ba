//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::credentials::{CredentialHasher, DEFAULT_HASH_COST};
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

const MIN_SECRET_LENGTH: usize = 32;

const GENERATED_PASSWORD_LENGTH: usize = 24;

// Development-only fallbacks. Distinct values so the two token classes
// never share a key, even on a laptop.
const PLACEHOLDER_ACCESS_SECRET: &str = "courtyard-dev-access-secret-0123456789abcdef";
const PLACEHOLDER_REFRESH_SECRET: &str = "courtyard-dev-refresh-secret-0123456789abcdef";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Courtyard", about = "Residential community management server")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7280", env = "COURTYARD_PORT")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "courtyard.db", env = "COURTYARD_DATABASE")]
    pub database: String,

    /// Public origin the server is reached at (e.g., "https://example.com").
    /// Cookies are marked Secure when the scheme is https
    #[arg(
        long,
        default_value = "http://localhost:7280",
        env = "COURTYARD_PUBLIC_ORIGIN"
    )]
    pub public_origin: String,

    /// Refresh token lifetime in days
    #[arg(long, default_value = "14", value_parser = clap::value_parser!(u64).range(1..=365))]
    pub refresh_token_days: u64,

    /// Disable new member signups (admin creation via --create-admin still works)
    #[arg(long)]
    pub no_signup: bool,

    /// Create an approved super admin with this email on startup and print
    /// a one-time password
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Parse and validate the public-origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_origin(public_origin: &str) -> Option<Url> {
    let url = match Url::parse(public_origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %public_origin, error = %e, "Invalid public-origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("public-origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Load both token signing secrets from the environment.
///
/// `ACCESS_TOKEN_SECRET` and `REFRESH_TOKEN_SECRET` are read, cleared from
/// the environment, and length-checked. When `allow_placeholder` is set
/// (non-HTTPS development origins) a missing secret falls back to a fixed
/// placeholder with a warning; otherwise it is a startup failure.
pub fn load_token_secrets(allow_placeholder: bool) -> Option<(Vec<u8>, Vec<u8>)> {
    let access = load_secret(
        "ACCESS_TOKEN_SECRET",
        allow_placeholder,
        PLACEHOLDER_ACCESS_SECRET,
    )?;
    let refresh = load_secret(
        "REFRESH_TOKEN_SECRET",
        allow_placeholder,
        PLACEHOLDER_REFRESH_SECRET,
    )?;

    if access == refresh {
        error!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        return None;
    }

    Some((access, refresh))
}

fn load_secret(name: &str, allow_placeholder: bool, placeholder: &str) -> Option<Vec<u8>> {
    match std::env::var(name) {
        Ok(secret) => {
            // Clear the environment variable to prevent leaking.
            // SAFETY: We're single-threaded at this point during startup,
            // and no other code is reading this environment variable.
            unsafe { std::env::remove_var(name) };

            if secret.len() < MIN_SECRET_LENGTH {
                error!(
                    "{} is shorter than {} characters. Use a longer secret",
                    name, MIN_SECRET_LENGTH
                );
                return None;
            }
            Some(secret.into_bytes())
        }
        Err(_) if allow_placeholder => {
            warn!(
                "{} is not set; using a development placeholder. Set it for production",
                name
            );
            Some(placeholder.as_bytes().to_vec())
        }
        Err(_) => {
            error!("{} is required. Set it in the environment", name);
            None
        }
    }
}

/// Handle the --create-admin flag: create an approved super admin and print
/// a one-time password to stdout.
pub async fn handle_create_admin(db: &Database, hasher: &CredentialHasher, email: &str) {
    match db.members().get_by_email(email).await {
        Ok(Some(_)) => {
            error!(email = %email, "A member with this email already exists");
            std::process::exit(1);
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing member");
            std::process::exit(1);
        }
    }

    let password: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect();

    let password_hash = match hasher.hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash generated password");
            std::process::exit(1);
        }
    };

    let uuid = Uuid::new_v4().to_string();
    match db
        .members()
        .create_admin(&uuid, email, "Administrator", &password_hash)
        .await
    {
        Ok(_) => {
            println!();
            println!("Admin member created: {}", email);
            println!("One-time password: {}", password);
            println!("Log in and change it.");
            println!();
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin member");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    public_origin: &Url,
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    refresh_token_days: u64,
    no_signup: bool,
) -> ServerConfig {
    let secure_cookies = public_origin.scheme() == "https";

    ServerConfig {
        db,
        access_secret,
        refresh_secret,
        refresh_token_days,
        hasher: CredentialHasher::new(DEFAULT_HASH_COST),
        rate_limit: RateLimitConfig::new(),
        secure_cookies,
        no_signup,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
