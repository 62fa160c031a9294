//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down abuse of the
//! OAuth round trip.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SEC: u32 = 10;
const CALLBACK_PER_SEC: u32 = 1;
const CALLBACK_BURST: u32 = 5;

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for starting a login (generous: 10 requests per second)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for the provider callback (strict: burst of 5, then 1 per second)
    pub callback: Arc<IpLimiter>,
    /// Take the client IP from `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Create rate limiters with default configuration.
    pub fn new(trust_proxy: bool) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_second(non_zero(LOGIN_PER_SEC)))),
            callback: Arc::new(RateLimiter::keyed(
                Quota::per_second(non_zero(CALLBACK_PER_SEC))
                    .allow_burst(non_zero(CALLBACK_BURST)),
            )),
            trust_proxy,
        }
    }
}

fn check(limiter: &IpLimiter, request: &Request, trust_proxy: bool, message: &'static str) -> Option<Response> {
    let ip = match extract_client_ip(request, trust_proxy) {
        Ok(ip) => ip,
        Err(reason) => {
            tracing::warn!(reason, "Rejecting request without client IP");
            return Some((StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response());
        }
    };

    match limiter.check_key(&ip) {
        Ok(_) => None,
        Err(_) => {
            tracing::warn!(%ip, "Rate limit exceeded");
            Some((StatusCode::TOO_MANY_REQUESTS, message).into_response())
        }
    }
}

/// Middleware for rate limiting login start.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.login,
        &request,
        config.trust_proxy,
        "Too many requests. Please try again later.",
    ) {
        Some(rejection) => rejection,
        None => next.run(request).await,
    }
}

/// Middleware for rate limiting the OAuth callback.
pub async fn rate_limit_callback(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.callback,
        &request,
        config.trust_proxy,
        "Too many authentication attempts. Please wait before trying again.",
    ) {
        Some(rejection) => rejection,
        None => next.run(request).await,
    }
}
