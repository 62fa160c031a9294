#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, header},
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;
use waypoint::{
    ServerConfig, create_app,
    db::{Database, NewUser, User},
    jwt::JwtConfig,
    oauth::{IdentityClaims, IdentityProvider, OAuthError},
};

pub const SECRET: &[u8] = b"integration-test-secret-at-least-32-bytes";

/// Provider that accepts a fixed code and returns fixed claims.
pub struct FakeProvider {
    pub code: String,
    pub claims: IdentityClaims,
}

impl FakeProvider {
    pub fn new(code: &str, sub: &str, email: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            claims: IdentityClaims {
                sub: sub.to_string(),
                email: email.to_string(),
                name: Some(name.to_string()),
                given_name: None,
                family_name: None,
                picture: None,
                locale: Some("es-ES".to_string()),
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, OAuthError> {
        Url::parse_with_params(
            "https://accounts.example.com/auth",
            &[("redirect_uri", redirect_uri), ("state", state)],
        )
        .map_err(|e| OAuthError::InvalidResponse(e.to_string()))
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<IdentityClaims, OAuthError> {
        if code == self.code {
            Ok(self.claims.clone())
        } else {
            Err(OAuthError::Rejected("bad code".to_string()))
        }
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

pub async fn setup() -> TestApp {
    setup_with_provider(None).await
}

pub async fn setup_with_provider(provider: Option<Arc<dyn IdentityProvider>>) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: SECRET.to_vec(),
        public_url: Url::parse("http://localhost:8000").expect("Invalid URL"),
        secure_cookies: false,
        trust_proxy: false,
        identity_provider: provider,
    };
    TestApp {
        app: create_app(&config),
        db,
        jwt: JwtConfig::new(SECRET),
    }
}

impl TestApp {
    /// Create a user and return it with a Cookie header value for its session.
    pub async fn sign_in(&self, email: &str, name: &str) -> (User, String) {
        let user = self
            .db
            .users()
            .upsert(&NewUser::new(&format!("google-{email}"), email, name))
            .await
            .expect("Failed to create user");
        let token = self
            .jwt
            .generate_access_token(&user.uuid)
            .expect("Failed to sign token");
        (user, format!("access_token={}", token.token))
    }

    /// Cookie header value for a fresh guest session.
    pub fn guest(&self) -> String {
        let guest = self
            .jwt
            .generate_guest_token()
            .expect("Failed to sign guest token");
        format!("guest_session={}", guest.token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }

    /// Create a trip and return its public id.
    pub async fn create_trip(&self, cookie: &str, body: Value) -> String {
        let response = self
            .send(request("POST", "/api/trips", Some(cookie), Some(body)))
            .await;
        assert_eq!(response.status(), 201);
        body_json(response).await["id"]
            .as_str()
            .expect("trip id")
            .to_string()
    }
}

/// Build a request from a local peer, with optional cookies and JSON body.
pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let mut request = builder.body(body).expect("Invalid request");
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    request
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Body is not JSON")
}

/// All `Set-Cookie` header values of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of a cookie set by a response, if any.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
