//! Resolve request cookies to a caller identity.

use axum::http::HeaderMap;
use tracing::debug;

use super::cookie::{ACCESS_COOKIE_NAME, GUEST_COOKIE_NAME, get_cookie};
use crate::db::{Database, Owner, User};
use crate::jwt::JwtConfig;

/// Who is making a request.
#[derive(Debug, Clone)]
pub enum Identity {
    /// Valid access token for an existing, active user
    User(User),
    /// Valid guest token; the session id is the identity
    Guest(String),
    Anonymous,
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::User(user) => Some(user),
            _ => None,
        }
    }

    /// The owner that trips created by this caller belong to.
    pub fn owner(&self) -> Option<Owner> {
        match self {
            Identity::User(user) => Some(Owner::User(user.id)),
            Identity::Guest(session_id) => Some(Owner::Guest(session_id.clone())),
            Identity::Anonymous => None,
        }
    }
}

/// Resolve the `access_token` cookie to a user.
/// Bad signatures, expired tokens and unknown or inactive users all yield `None`.
pub async fn resolve_user(
    headers: &HeaderMap,
    jwt: &JwtConfig,
    db: &Database,
) -> Result<Option<User>, sqlx::Error> {
    let Some(token) = get_cookie(headers, ACCESS_COOKIE_NAME) else {
        return Ok(None);
    };

    let claims = match jwt.validate_access_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Ignoring invalid access token");
            return Ok(None);
        }
    };

    let user = db.users().get_by_uuid(&claims.sub).await?;
    Ok(user.filter(|u| u.is_active))
}

/// Resolve the caller: a signed-in user first, then a guest session, else anonymous.
/// Only storage failures are errors.
pub async fn resolve_identity(
    headers: &HeaderMap,
    jwt: &JwtConfig,
    db: &Database,
) -> Result<Identity, sqlx::Error> {
    if let Some(user) = resolve_user(headers, jwt, db).await? {
        return Ok(Identity::User(user));
    }

    if let Some(token) = get_cookie(headers, GUEST_COOKIE_NAME) {
        match jwt.validate_guest_token(token) {
            Ok(session_id) => return Ok(Identity::Guest(session_id)),
            Err(e) => debug!(error = %e, "Ignoring invalid guest token"),
        }
    }

    Ok(Identity::Anonymous)
}
