//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::CookieSpec;
use crate::db::Database;
use clap::Parser;
use tracing::{error, info};
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Clipgate",
    about = "Session and credential service for a multi-client video platform"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "clipgate.db")]
    pub database: String,

    /// Public origin clients reach this server at (full URL). Decides the
    /// Secure flag and Domain attribute of session cookies
    #[arg(long, default_value = "http://localhost:8000")]
    pub public_origin: String,

    /// Path to a file containing the access credential signing secret.
    /// Prefer the ACCESS_TOKEN_SECRET env var instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to a file containing the refresh credential signing secret.
    /// Prefer the REFRESH_TOKEN_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

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

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or pass a secret file",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the public origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_origin(origin: &str) -> Option<Url> {
    let url = match Url::parse(origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %origin, error = %e, "Invalid public origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));

    if !is_https && !is_localhost {
        error!("Public origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Derive session cookie attributes from the public origin.
pub fn cookie_spec_for_origin(origin: &Url) -> CookieSpec {
    let secure = origin.scheme() == "https";
    let domain = match origin.host_str() {
        Some(host) if host != "localhost" && host != "127.0.0.1" => Some(host.to_string()),
        _ => None,
    };
    CookieSpec { secure, domain }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    access_secret: String,
    refresh_secret: String,
    origin: &Url,
) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        cookies: cookie_spec_for_origin(origin),
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
