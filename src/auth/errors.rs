//! Authentication error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::cookie::{ACCESS_COOKIE_NAME, clear_cookie};

/// Internal auth error kind used by the identity extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    DatabaseError,
    TokenError,
}

/// API authentication errors (returns JSON; a 401 also clears a stale access token).
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
    pub(super) secure_cookies: bool,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind, secure_cookies: bool) -> Self {
        Self {
            kind,
            secure_cookies,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AuthErrorKind::DatabaseError | AuthErrorKind::TokenError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::DatabaseError => "Database error",
            AuthErrorKind::TokenError => "Failed to create session",
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let mut response = (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response();

        if self.kind == AuthErrorKind::NotAuthenticated {
            let clear_access = clear_cookie(ACCESS_COOKIE_NAME, self.secure_cookies);
            if let Ok(value) = HeaderValue::from_str(&clear_access) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }

        response
    }
}
