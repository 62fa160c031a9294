//! Caller identity for signed-in users, guest sessions and anonymous callers.
//!
//! Signed-in users carry a 7-day access token; anyone else may hold a 30-day
//! guest session token. Routes that create or list data mint a guest session
//! on first contact.

mod cookie;
mod errors;
mod extractors;
mod identity;
mod ip;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, GUEST_COOKIE_NAME, LANG_COOKIE_NAME, OAUTH_STATE_COOKIE_NAME,
    clear_cookie, get_cookie, public_cookie, session_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Caller, CurrentUser, MaybeIdentity, NEW_SESSION_COOKIE, attach_session_cookie};
pub use identity::{Identity, resolve_identity, resolve_user};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use state::{HasAuthBackend, ServerSettings};
