mod auth;
mod bookings;
mod config;
mod error;
mod patch;
mod session;
mod todos;
mod trips;

use axum::Router;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::auth::ServerSettings;
use crate::db::Database;
use crate::export::TripExporter;
use crate::i18n::Translator;
use crate::jwt::JwtConfig;
use crate::oauth::IdentityProvider;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, DATETIME_FORMAT};

/// `skip`/`limit` query parameters of list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Services shared by every router, constructed once at startup.
#[derive(Clone)]
pub struct Services {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub settings: ServerSettings,
    pub translator: Arc<Translator>,
    pub exporter: Arc<dyn TripExporter>,
    pub provider: Option<Arc<dyn IdentityProvider>>,
    pub public_url: Url,
}

/// Create the router mounted at `/api`.
pub fn create_api_router(services: &Services) -> Router {
    let trips_state = trips::TripsState {
        db: services.db.clone(),
        jwt: services.jwt.clone(),
        settings: services.settings,
        exporter: services.exporter.clone(),
    };

    let bookings_state = bookings::BookingsState {
        db: services.db.clone(),
        jwt: services.jwt.clone(),
        settings: services.settings,
    };

    let todos_state = todos::TodosState {
        db: services.db.clone(),
        jwt: services.jwt.clone(),
        settings: services.settings,
    };

    let config_state = config::ConfigState {
        oauth_enabled: services.provider.is_some(),
        jwt: services.jwt.clone(),
        db: services.db.clone(),
        settings: services.settings,
    };

    Router::new()
        .nest("/trips", trips::router(trips_state))
        .nest("/bookings", bookings::router(bookings_state))
        .nest("/todos", todos::router(todos_state))
        .nest("/config", config::router(config_state))
}

/// Create the browser-facing routes: `/auth/*`, guest start, logout and language.
pub fn create_session_router(services: &Services, rate_limits: Arc<RateLimitConfig>) -> Router {
    let auth_state = auth::AuthState {
        db: services.db.clone(),
        jwt: services.jwt.clone(),
        settings: services.settings,
        provider: services.provider.clone(),
        public_url: services.public_url.clone(),
        translator: services.translator.clone(),
    };

    let session_state = session::SessionState {
        db: services.db.clone(),
        jwt: services.jwt.clone(),
        settings: services.settings,
        translator: services.translator.clone(),
    };

    Router::new()
        .nest("/auth", auth::router(auth_state, rate_limits))
        .merge(session::router(session_state))
}
