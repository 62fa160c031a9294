//! Signed session tokens: user access tokens and guest session tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type, so an access token is never accepted as a guest token and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Signed-in user (7 days)
    Access,
    /// Anonymous guest session (30 days)
    Guest,
}

/// JWT claims shared by both token types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: user UUID for access tokens, session id for guest tokens
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 7 days
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Guest session duration: 30 days
pub const GUEST_TOKEN_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct TokenResult {
    /// The JWT token string
    pub token: String,
    /// Token duration in seconds
    pub duration: u64,
}

/// A newly minted guest session.
#[derive(Debug, Clone)]
pub struct GuestTokenResult {
    /// Random session identifier carried in the token subject
    pub session_id: String,
    pub token: String,
    pub duration: u64,
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    fn sign(
        &self,
        sub: &str,
        token_type: TokenType,
        duration: u64,
    ) -> Result<TokenResult, JwtError> {
        let now = now_secs()?;
        let claims = SessionClaims {
            sub: sub.to_string(),
            token_type,
            iat: now,
            exp: now + duration,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(TokenResult { token, duration })
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<SessionClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != expected {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Generate an access token for a signed-in user.
    pub fn generate_access_token(&self, user_uuid: &str) -> Result<TokenResult, JwtError> {
        self.sign(user_uuid, TokenType::Access, ACCESS_TOKEN_DURATION_SECS)
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<SessionClaims, JwtError> {
        self.verify(token, TokenType::Access)
    }

    /// Mint a guest session with a new random identifier.
    pub fn generate_guest_token(&self) -> Result<GuestTokenResult, JwtError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let result = self.sign(&session_id, TokenType::Guest, GUEST_TOKEN_DURATION_SECS)?;
        Ok(GuestTokenResult {
            session_id,
            token: result.token,
            duration: result.duration,
        })
    }

    /// Validate a guest token and return its session id.
    /// Tokens issued more than 30 days ago are rejected whatever their `exp`.
    pub fn validate_guest_token(&self, token: &str) -> Result<String, JwtError> {
        let claims = self.verify(token, TokenType::Guest)?;
        if now_secs()?.saturating_sub(claims.iat) > GUEST_TOKEN_DURATION_SECS {
            return Err(JwtError::TooOld);
        }
        if claims.sub.is_empty() {
            return Err(JwtError::MissingSubject);
        }
        Ok(claims.sub)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using a guest token as access token)
    WrongTokenType,
    /// Issued longer ago than the maximum session age
    TooOld,
    /// Empty subject
    MissingSubject,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
            JwtError::TooOld => write!(f, "Token exceeds maximum age"),
            JwtError::MissingSubject => write!(f, "Token has no subject"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge(secret: &[u8], token_type: TokenType, iat: u64, exp: u64) -> String {
        let claims = SessionClaims {
            sub: "session-1".to_string(),
            token_type,
            iat,
            exp,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let result = config.generate_access_token("uuid-123").unwrap();
        assert_eq!(result.duration, ACCESS_TOKEN_DURATION_SECS);

        let claims = config.validate_access_token(&result.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_DURATION_SECS);
    }

    #[test]
    fn test_generate_and_validate_guest_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let guest = config.generate_guest_token().unwrap();
        assert_eq!(guest.duration, GUEST_TOKEN_DURATION_SECS);
        assert!(uuid::Uuid::parse_str(&guest.session_id).is_ok());

        let session_id = config.validate_guest_token(&guest.token).unwrap();
        assert_eq!(session_id, guest.session_id);
    }

    #[test]
    fn test_guest_sessions_are_unique() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");
        let a = config.generate_guest_token().unwrap();
        let b = config.generate_guest_token().unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let access = config.generate_access_token("uuid-123").unwrap();
        let guest = config.generate_guest_token().unwrap();

        assert!(matches!(
            config.validate_guest_token(&access.token),
            Err(JwtError::WrongTokenType)
        ));
        assert!(matches!(
            config.validate_access_token(&guest.token),
            Err(JwtError::WrongTokenType)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");
        assert!(config.validate_access_token("invalid-token").is_err());
        assert!(config.validate_guest_token("invalid-token").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"secret-1");
        let config2 = JwtConfig::new(b"secret-2");

        let access = config1.generate_access_token("uuid-123").unwrap();
        assert!(config2.validate_access_token(&access.token).is_err());

        let guest = config1.generate_guest_token().unwrap();
        assert!(config2.validate_guest_token(&guest.token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let secret = b"test-secret";
        let now = now_secs().unwrap();

        let token = forge(secret, TokenType::Access, now - 100, now - 50);
        let config = JwtConfig::new(secret);
        assert!(config.validate_access_token(&token).is_err());

        let token = forge(secret, TokenType::Guest, now - 100, now - 50);
        assert!(config.validate_guest_token(&token).is_err());
    }

    #[test]
    fn test_old_guest_token_rejected_despite_far_expiry() {
        let secret = b"test-secret";
        let now = now_secs().unwrap();

        // Validly signed, still unexpired, but issued 31 days ago
        let iat = now - GUEST_TOKEN_DURATION_SECS - 24 * 60 * 60;
        let token = forge(secret, TokenType::Guest, iat, now + 3600);

        let config = JwtConfig::new(secret);
        assert!(matches!(
            config.validate_guest_token(&token),
            Err(JwtError::TooOld)
        ));
    }
}
