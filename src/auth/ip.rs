//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::{extract::ConnectInfo, http::request::Parts};

/// Header set by the reverse proxy when running with `--trust-proxy`.
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Trait for types that provide access to HTTP headers and extensions.
/// Implemented for both `Parts` and `Request` to allow flexible IP extraction.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl HasHeadersAndExtensions for Parts {
    fn headers(&self) -> &axum::http::HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &axum::http::Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Extract the client IP address.
///
/// With `trust_proxy`, the last address of `X-Forwarded-For` (the one the
/// proxy appended; earlier entries are client-supplied) is used and a
/// missing or malformed header is an error (no fallback to the socket address).
/// Otherwise the peer address from `ConnectInfo` is used.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    trust_proxy: bool,
) -> Result<String, &'static str> {
    if trust_proxy {
        let header_value = source
            .headers()
            .get(FORWARDED_FOR)
            .ok_or("IP header not present")?
            .to_str()
            .map_err(|_| "IP header contains invalid characters")?;
        let last = header_value.rsplit(',').next().unwrap_or("").trim();
        let ip: IpAddr = last.parse().map_err(|_| "IP header is not an address")?;
        return Ok(ip.to_string());
    }

    source
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .ok_or("No client IP available")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};

    #[test]
    fn test_forwarded_for_uses_proxy_entry() {
        let request = Request::builder()
            .header(FORWARDED_FOR, "203.0.113.7, 198.51.100.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_client_ip(&request, true),
            Ok("198.51.100.4".to_string())
        );

        // Spoofed leading entries do not change the key
        let spoofed = Request::builder()
            .header(FORWARDED_FOR, "1.2.3.4, 5.6.7.8, 198.51.100.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_client_ip(&spoofed, true),
            Ok("198.51.100.4".to_string())
        );
    }

    #[test]
    fn test_forwarded_for_required_when_trusting_proxy() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_client_ip(&request, true).is_err());

        let request = Request::builder()
            .header(FORWARDED_FOR, "not-an-ip")
            .body(Body::empty())
            .unwrap();
        assert!(extract_client_ip(&request, true).is_err());
    }

    #[test]
    fn test_connect_info() {
        let mut request = Request::builder()
            .header(FORWARDED_FOR, "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert!(extract_client_ip(&request, false).is_err());

        let addr: SocketAddr = "192.0.2.1:4000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        // The header is ignored unless the proxy is trusted
        assert_eq!(
            extract_client_ip(&request, false),
            Ok("192.0.2.1".to_string())
        );
    }
}
