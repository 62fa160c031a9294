//! Axum extractors for caller identity.

use std::cell::RefCell;

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};

use super::cookie::{GUEST_COOKIE_NAME, session_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::identity::{Identity, resolve_identity, resolve_user};
use super::state::HasAuthBackend;
use crate::db::{Owner, User};

tokio::task_local! {
    /// Task-local storage for a newly minted guest session cookie.
    /// Used to pass the cookie from the `Caller` extractor to the response middleware.
    pub static NEW_SESSION_COOKIE: RefCell<Option<String>>;
}

fn db_error<S: HasAuthBackend>(state: &S, e: sqlx::Error) -> ApiAuthError {
    tracing::error!("Failed to resolve identity: {}", e);
    ApiAuthError::new(AuthErrorKind::DatabaseError, state.settings().secure_cookies)
}

/// Optional identity - never mints a session, may be `Anonymous`.
/// Used for point lookups, where an anonymous caller simply finds nothing.
pub struct MaybeIdentity(pub Identity);

impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_identity(&parts.headers, state.jwt(), state.db())
            .await
            .map(MaybeIdentity)
            .map_err(|e| db_error(state, e))
    }
}

/// Extractor for endpoints that require a signed-in user.
/// Guests and anonymous callers get 401.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_user(&parts.headers, state.jwt(), state.db())
            .await
            .map_err(|e| db_error(state, e))?
            .map(CurrentUser)
            .ok_or_else(|| {
                ApiAuthError::new(
                    AuthErrorKind::NotAuthenticated,
                    state.settings().secure_cookies,
                )
            })
    }
}

/// Identity that can own data. An anonymous caller gets a fresh guest
/// session, whose cookie is attached to the response by `attach_session_cookie`.
pub struct Caller {
    pub identity: Identity,
    pub owner: Owner,
}

impl<S> FromRequestParts<S> for Caller
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeIdentity(identity) = MaybeIdentity::from_request_parts(parts, state).await?;

        if let Some(owner) = identity.owner() {
            return Ok(Caller { identity, owner });
        }

        let secure = state.settings().secure_cookies;
        let guest = state.jwt().generate_guest_token().map_err(|e| {
            tracing::error!("Failed to generate guest token: {}", e);
            ApiAuthError::new(AuthErrorKind::TokenError, secure)
        })?;

        let cookie = session_cookie(GUEST_COOKIE_NAME, &guest.token, guest.duration, secure);
        let _ = NEW_SESSION_COOKIE.try_with(|cell| {
            cell.borrow_mut().replace(cookie);
        });
        tracing::debug!(session_id = %guest.session_id, "Started guest session");

        Ok(Caller {
            identity: Identity::Guest(guest.session_id.clone()),
            owner: Owner::Guest(guest.session_id),
        })
    }
}

/// Middleware that appends a guest session cookie minted while handling the request.
pub async fn attach_session_cookie(request: Request, next: Next) -> Response {
    NEW_SESSION_COOKIE
        .scope(RefCell::new(None), async move {
            let mut response = next.run(request).await;
            let cookie = NEW_SESSION_COOKIE.with(|cell| cell.borrow_mut().take());
            if let Some(cookie) = cookie {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
            }
            response
        })
        .await
}
