//! Public configuration endpoint.

use axum::{Json, Router, extract::State, http::HeaderMap, routing::get};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::{Identity, MaybeIdentity, ServerSettings};
use crate::db::Database;
use crate::i18n::{SUPPORTED_LANGUAGES, language_name, request_language};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// Version embedded at compile time from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct ConfigState {
    pub oauth_enabled: bool,
    pub jwt: Arc<JwtConfig>,
    pub db: Database,
    pub settings: ServerSettings,
}

impl_has_auth_backend!(ConfigState);

#[derive(Serialize)]
struct ConfigResponse {
    oauth_enabled: bool,
    authenticated: bool,
    guest: bool,
    language: &'static str,
    languages: [&'static str; 2],
    /// Display name of each supported language
    language_names: BTreeMap<&'static str, &'static str>,
    version: &'static str,
}

pub fn router(state: ConfigState) -> Router {
    Router::new().route("/", get(get_config)).with_state(state)
}

async fn get_config(
    State(state): State<ConfigState>,
    MaybeIdentity(identity): MaybeIdentity,
    headers: HeaderMap,
) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        oauth_enabled: state.oauth_enabled,
        authenticated: matches!(identity, Identity::User(_)),
        guest: matches!(identity, Identity::Guest(_)),
        language: request_language(&headers),
        languages: SUPPORTED_LANGUAGES,
        language_names: SUPPORTED_LANGUAGES
            .iter()
            .filter_map(|code| language_name(code).map(|name| (*code, name)))
            .collect(),
        version: VERSION,
    })
}
