//! Cookie parsing and `Set-Cookie` builders.

use axum::http::header;

/// Signed-in user session (7 days).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Anonymous guest session (30 days).
pub const GUEST_COOKIE_NAME: &str = "guest_session";

/// CSRF state for the provider round trip.
pub const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";

/// Preferred interface language.
pub const LANG_COOKIE_NAME: &str = "lang";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Build an HttpOnly `Set-Cookie` value scoped to the whole site.
pub fn session_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        name,
        value,
        max_age,
        secure_flag(secure)
    )
}

/// Build a `Set-Cookie` value readable by scripts.
pub fn public_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; SameSite=Lax; Path=/; Max-Age={}{}",
        name,
        value,
        max_age,
        secure_flag(secure)
    )
}

/// Build a `Set-Cookie` value that removes a cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}

fn secure_flag(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}
