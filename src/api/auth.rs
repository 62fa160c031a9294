//! Google sign-in and the signed-in user's profile.
//!
//! The login round trip is protected by a random `state` value kept in a
//! short-lived cookie. Every callback failure sends the browser back to the
//! login page instead of surfacing an error.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use super::error::{ApiError, ResultExt, validate_required};
use super::session::{end_sessions, redirect_with_cookies};
use crate::auth::{
    ACCESS_COOKIE_NAME, CurrentUser, LANG_COOKIE_NAME, OAUTH_STATE_COOKIE_NAME, ServerSettings,
    clear_cookie, get_cookie, public_cookie, session_cookie,
};
use crate::db::{Database, NewUser, User, normalize_email};
use crate::i18n::{Translator, is_supported, language_from_locale, request_language};
use crate::impl_has_auth_backend;
use crate::jwt::{GUEST_TOKEN_DURATION_SECS, JwtConfig};
use crate::oauth::{IdentityProvider, generate_state};
use crate::rate_limit::{RateLimitConfig, rate_limit_callback, rate_limit_login};

/// Lifetime of the OAuth state cookie: 10 minutes
const OAUTH_STATE_MAX_AGE: u64 = 10 * 60;

const LOGIN_FAILED_PATH: &str = "/login?error=authentication_failed";

/// State for authentication endpoints.
#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub settings: ServerSettings,
    pub provider: Option<Arc<dyn IdentityProvider>>,
    /// Base for the callback URL registered with the provider
    pub public_url: Url,
    pub translator: Arc<Translator>,
}

impl_has_auth_backend!(AuthState);

impl AuthState {
    fn redirect_uri(&self) -> Result<String, url::ParseError> {
        Ok(self.public_url.join("/auth/callback")?.to_string())
    }
}

pub fn router(state: AuthState, rate_limits: Arc<RateLimitConfig>) -> Router {
    let login = Router::new()
        .route("/login", get(login))
        .route_layer(middleware::from_fn_with_state(
            rate_limits.clone(),
            rate_limit_login,
        ));
    let callback = Router::new()
        .route("/callback", get(callback))
        .route_layer(middleware::from_fn_with_state(
            rate_limits,
            rate_limit_callback,
        ));

    Router::new()
        .merge(login)
        .merge(callback)
        .route("/logout", get(logout_redirect).post(logout))
        .route("/me", get(get_me).put(update_me))
        .with_state(state)
}

// --- Login round trip ---

async fn login(State(state): State<AuthState>) -> Result<Response, ApiError> {
    let Some(provider) = &state.provider else {
        return Err(ApiError::service_unavailable(
            "Google OAuth is not configured",
        ));
    };

    let redirect_uri = state
        .redirect_uri()
        .map_err(|e| ApiError::internal(format!("Invalid public URL: {}", e)))?;
    let oauth_state = generate_state();
    let url = provider
        .authorize_url(&redirect_uri, &oauth_state)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let cookie = session_cookie(
        OAUTH_STATE_COOKIE_NAME,
        &oauth_state,
        OAUTH_STATE_MAX_AGE,
        state.settings.secure_cookies,
    );
    Ok(redirect_with_cookies(url.as_str(), &[cookie]))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Verify the round trip, check the allowlist and sign the user in.
async fn complete_login(
    state: &AuthState,
    headers: &HeaderMap,
    query: CallbackQuery,
) -> Result<User, String> {
    if let Some(error) = query.error {
        return Err(format!("provider returned error: {error}"));
    }
    let provider = state
        .provider
        .as_ref()
        .ok_or_else(|| "OAuth is not configured".to_string())?;

    let expected = get_cookie(headers, OAUTH_STATE_COOKIE_NAME).filter(|s| !s.is_empty());
    match (expected, query.state.as_deref()) {
        (Some(expected), Some(actual)) if expected == actual => {}
        _ => return Err("state mismatch".to_string()),
    }

    let code = query.code.ok_or_else(|| "missing code".to_string())?;
    let redirect_uri = state.redirect_uri().map_err(|e| e.to_string())?;
    let claims = provider
        .exchange_code(&code, &redirect_uri)
        .await
        .map_err(|e| e.to_string())?;

    let email = normalize_email(&claims.email);
    let allowed = state
        .db
        .allowlist()
        .is_allowed(&email)
        .await
        .map_err(|e| format!("allowlist lookup failed: {e}"))?;
    if !allowed {
        return Err(format!("{email} is not on the allowlist"));
    }

    let name = claims
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.clone());
    let new_user = NewUser {
        given_name: claims.given_name,
        family_name: claims.family_name,
        picture: claims.picture,
        preferred_language: language_from_locale(claims.locale.as_deref()).to_string(),
        ..NewUser::new(&claims.sub, &email, &name)
    };

    let user = state
        .db
        .users()
        .upsert(&new_user)
        .await
        .map_err(|e| format!("failed to store user: {e}"))?;
    if !user.is_active {
        return Err(format!("{email} is deactivated"));
    }
    Ok(user)
}

async fn callback(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let secure = state.settings.secure_cookies;
    let clear_state = clear_cookie(OAUTH_STATE_COOKIE_NAME, secure);

    let user = match complete_login(&state, &headers, query).await {
        Ok(user) => user,
        Err(reason) => {
            warn!(reason = %reason, "Login failed");
            return redirect_with_cookies(LOGIN_FAILED_PATH, &[clear_state]);
        }
    };

    let token = match state.jwt.generate_access_token(&user.uuid) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to generate access token: {}", e);
            return redirect_with_cookies(LOGIN_FAILED_PATH, &[clear_state]);
        }
    };

    info!(user = %user.uuid, "User signed in");
    redirect_with_cookies(
        "/",
        &[
            clear_state,
            session_cookie(ACCESS_COOKIE_NAME, &token.token, token.duration, secure),
            public_cookie(
                LANG_COOKIE_NAME,
                &user.preferred_language,
                GUEST_TOKEN_DURATION_SECS,
                secure,
            ),
        ],
    )
}

// --- Signed-in user ---

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn logout(
    State(state): State<AuthState>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
) -> impl IntoResponse {
    info!(user = %user.uuid, "User signed out");
    let cookie = clear_cookie(ACCESS_COOKIE_NAME, state.settings.secure_cookies);
    let mut response_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response_headers.insert(header::SET_COOKIE, value);
    }
    let message = state
        .translator
        .translate("Successfully logged out", request_language(&headers))
        .to_string();
    (response_headers, Json(MessageResponse { message }))
}

/// Browser logout: drops the guest session as well.
async fn logout_redirect(State(state): State<AuthState>) -> Response {
    end_sessions(state.settings.secure_cookies)
}

async fn get_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[derive(Deserialize)]
struct UpdateMeRequest {
    name: Option<String>,
    preferred_language: Option<String>,
    preferred_currency: Option<String>,
}

async fn update_me(
    State(state): State<AuthState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<User>, ApiError> {
    if let Some(name) = &payload.name {
        validate_required("name", name)?;
    }
    if let Some(language) = &payload.preferred_language {
        if !is_supported(language) {
            return Err(ApiError::bad_request("Unsupported language"));
        }
    }
    let currency = payload.preferred_currency.map(|c| c.trim().to_uppercase());
    if let Some(currency) = &currency {
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ApiError::bad_request("Currency must be a 3-letter code"));
        }
    }

    let users = state.db.users();
    users
        .update_preferences(
            user.id,
            payload.name.as_deref().map(str::trim),
            payload.preferred_language.as_deref(),
            currency.as_deref(),
        )
        .await
        .db_err("Failed to update user")?;

    let user = users
        .get_by_id(user.id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}
