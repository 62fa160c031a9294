//! Browser session endpoints: guest start, logout redirect and language choice.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Caller, GUEST_COOKIE_NAME, Identity, LANG_COOKIE_NAME, MaybeIdentity,
    ServerSettings, clear_cookie, public_cookie,
};
use crate::db::Database;
use crate::i18n::{Translator, is_supported};
use crate::impl_has_auth_backend;
use crate::jwt::{GUEST_TOKEN_DURATION_SECS, JwtConfig};

/// State for session endpoints.
#[derive(Clone)]
pub struct SessionState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub settings: ServerSettings,
    pub translator: Arc<Translator>,
}

impl_has_auth_backend!(SessionState);

pub fn router(state: SessionState) -> Router {
    Router::new()
        .route("/start-guest", get(start_guest))
        .route("/logout", get(logout_redirect))
        .route("/set-language", post(set_language))
        .with_state(state)
}

/// A 302 redirect carrying `Set-Cookie` headers.
pub(super) fn redirect_with_cookies(location: &str, cookies: &[String]) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(location) {
        headers.insert(header::LOCATION, value);
    }
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Ensure the caller has a session, then go to the app.
/// An anonymous caller gets a guest cookie from `attach_session_cookie`.
async fn start_guest(_caller: Caller) -> Response {
    redirect_with_cookies("/", &[])
}

/// Clear both session cookies and go to the login page.
pub(super) fn end_sessions(secure: bool) -> Response {
    redirect_with_cookies(
        "/login",
        &[
            clear_cookie(ACCESS_COOKIE_NAME, secure),
            clear_cookie(GUEST_COOKIE_NAME, secure),
        ],
    )
}

async fn logout_redirect(State(state): State<SessionState>) -> Response {
    end_sessions(state.settings.secure_cookies)
}

#[derive(Deserialize)]
struct LanguageRequest {
    language: String,
}

#[derive(Serialize)]
struct LanguageResponse {
    message: String,
    language: String,
}

async fn set_language(
    State(state): State<SessionState>,
    MaybeIdentity(identity): MaybeIdentity,
    Json(payload): Json<LanguageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let language = payload.language.trim().to_lowercase();
    if !is_supported(&language) {
        return Err(ApiError::bad_request("Unsupported language"));
    }

    // Signed-in users keep the choice across devices
    if let Identity::User(user) = &identity {
        state
            .db
            .users()
            .update_preferences(user.id, None, Some(&language), None)
            .await
            .db_err("Failed to update preferred language")?;
    }

    let cookie = public_cookie(
        LANG_COOKIE_NAME,
        &language,
        GUEST_TOKEN_DURATION_SECS,
        state.settings.secure_cookies,
    );
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }

    let message = state.translator.translate("Language updated", &language).to_string();
    Ok((headers, Json(LanguageResponse { message, language })))
}
