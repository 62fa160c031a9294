//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::oauth::{GoogleProvider, IdentityProvider};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
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
#[command(name = "waypoint", about = "Travel itinerary manager")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_PATH", default_value = "waypoint.db")]
    pub database: String,

    /// Public base URL, used for the OAuth redirect URI (https enables Secure cookies)
    #[arg(long, env = "PUBLIC_URL", default_value = "http://localhost:8000")]
    pub public_url: String,

    /// Path to file containing the signing secret. Prefer the SECRET_KEY env var instead
    #[arg(long)]
    pub secret_file: Option<String>,

    /// Allow an email address to sign in (repeatable)
    #[arg(long = "allow-email", value_name = "EMAIL")]
    pub allow_emails: Vec<String>,

    /// Allow every address of a domain to sign in (repeatable)
    #[arg(long = "allow-domain", value_name = "DOMAIN")]
    pub allow_domains: Vec<String>,

    /// Take the client IP from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long)]
    pub trust_proxy: bool,

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

/// Load the signing secret from the environment or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("SECRET_KEY") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("SECRET_KEY") };
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
            "A signing secret is required. Set SECRET_KEY environment variable (recommended) or use --secret-file"
        );
        return None;
    };

    validate_secret(secret)
}

fn validate_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "Signing secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Parse and validate the public URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_url(public_url: &str) -> Option<Url> {
    let url = match Url::parse(public_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %public_url, error = %e, "Invalid public URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = matches!(url.host_str(), Some("localhost" | "127.0.0.1"));

    if !is_https && !is_localhost {
        error!("public-url must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Build the Google provider when both client credentials are set.
pub fn identity_provider_from_env() -> Option<Arc<dyn IdentityProvider>> {
    let client_id = std::env::var("GOOGLE_CLIENT_ID").ok().filter(|s| !s.is_empty());
    let client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok().filter(|s| !s.is_empty());

    match (client_id, client_secret) {
        (Some(id), Some(secret)) => match GoogleProvider::new(id, secret) {
            Ok(provider) => {
                info!("Google sign-in enabled");
                Some(Arc::new(provider))
            }
            Err(e) => {
                error!(error = %e, "Failed to set up Google sign-in");
                None
            }
        },
        (None, None) => {
            info!("Google sign-in not configured, running in guest-only mode");
            None
        }
        _ => {
            warn!("Both GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET are needed for sign-in");
            None
        }
    }
}

/// Add the allowlist entries given on the command line.
pub async fn seed_allowlist(db: &Database, emails: &[String], domains: &[String]) -> bool {
    let allowlist = db.allowlist();
    for email in emails {
        if let Err(e) = allowlist.add_email(email).await {
            error!(email = %email, error = %e, "Failed to add allowed email");
            return false;
        }
    }
    for domain in domains {
        if let Err(e) = allowlist.add_domain(domain).await {
            error!(domain = %domain, error = %e, "Failed to add allowed domain");
            return false;
        }
    }
    if !emails.is_empty() || !domains.is_empty() {
        info!(
            emails = emails.len(),
            domains = domains.len(),
            "Seeded sign-in allowlist"
        );
    }
    true
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    public_url: Url,
    secret: String,
    trust_proxy: bool,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
) -> ServerConfig {
    let secure_cookies = public_url.scheme() == "https";

    ServerConfig {
        db,
        jwt_secret: secret.into_bytes(),
        public_url,
        secure_cookies,
        trust_proxy,
        identity_provider,
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
