//! OAuth identity providers.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::Deserialize;
use tracing::error;
use url::Url;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity claims returned by a provider after a successful code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug)]
pub enum OAuthError {
    Request(String),
    Rejected(String),
    InvalidResponse(String),
}

impl std::fmt::Display for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthError::Request(msg) => write!(f, "Provider request failed: {}", msg),
            OAuthError::Rejected(msg) => write!(f, "Provider rejected the request: {}", msg),
            OAuthError::InvalidResponse(msg) => write!(f, "Invalid provider response: {}", msg),
        }
    }
}

impl std::error::Error for OAuthError {}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL to send the browser to for consent.
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, OAuthError>;

    /// Exchange an authorization code for the caller's identity claims.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<IdentityClaims, OAuthError>;
}

/// Random URL-safe value for the OAuth `state` parameter.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GoogleProvider {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("waypoint/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OAuthError::Request(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client_id,
            client_secret,
            http,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, OAuthError> {
        Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("access_type", "online"),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| OAuthError::InvalidResponse(e.to_string()))
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<IdentityClaims, OAuthError> {
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Token exchange failed");
            return Err(OAuthError::Rejected(format!("token endpoint returned {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::InvalidResponse(e.to_string()))?;

        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| OAuthError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(OAuthError::Rejected(format!("userinfo endpoint returned {status}")));
        }

        let claims: IdentityClaims = response
            .json()
            .await
            .map_err(|e| OAuthError::InvalidResponse(e.to_string()))?;

        if claims.sub.is_empty() || claims.email.is_empty() {
            return Err(OAuthError::InvalidResponse(
                "missing subject or email".to_string(),
            ));
        }
        Ok(claims)
    }
}
