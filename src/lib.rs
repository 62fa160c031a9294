pub mod access;
pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod export;
pub mod i18n;
pub mod jwt;
pub mod oauth;
pub mod rate_limit;

use api::{Services, create_api_router, create_session_router};
use auth::{ServerSettings, attach_session_cookie};
use axum::{Json, Router, middleware, routing::get};
use db::Database;
use export::PdfExporter;
use i18n::Translator;
use jwt::JwtConfig;
use oauth::IdentityProvider;
use rate_limit::RateLimitConfig;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access and guest tokens
    pub jwt_secret: Vec<u8>,
    /// Public base URL, used for the OAuth redirect URI
    pub public_url: Url,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Take the client IP from `X-Forwarded-For` (requires running behind a proxy)
    pub trust_proxy: bool,
    /// Sign-in provider; `None` runs in guest-only mode
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let translator = Arc::new(Translator::new());
    let settings = ServerSettings {
        secure_cookies: config.secure_cookies,
        trust_proxy: config.trust_proxy,
    };

    let services = Services {
        db: config.db.clone(),
        jwt: Arc::new(JwtConfig::new(&config.jwt_secret)),
        settings,
        translator: translator.clone(),
        exporter: Arc::new(PdfExporter::new(translator)),
        provider: config.identity_provider.clone(),
        public_url: config.public_url.clone(),
    };
    let rate_limits = Arc::new(RateLimitConfig::new(config.trust_proxy));

    Router::new()
        .route("/health", get(health))
        .nest("/api", create_api_router(&services))
        .merge(create_session_router(&services, rate_limits))
        .layer(middleware::from_fn(attach_session_cookie))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
