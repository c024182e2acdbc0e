use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    /// Random per token, so two tokens minted in the same second still differ
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Token secret is not configured")]
    MissingSecret,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn new(secret: &str, minutes: i64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(minutes),
        })
    }
}

/// Signs and verifies HS256 access and refresh tokens, each kind with its own secret
#[derive(Clone)]
pub struct TokenService {
    access: Arc<KeyPair>,
    refresh: Arc<KeyPair>,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Result<Self, TokenError> {
        Ok(Self {
            access: Arc::new(KeyPair::new(&config.access_token_secret, config.access_token_expiration_minutes)?),
            refresh: Arc::new(KeyPair::new(&config.refresh_token_secret, config.refresh_token_expiration_minutes)?),
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue_access_token(&self, user_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, TokenKind::Access)
    }

    pub fn issue_refresh_token(&self, user_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, TokenKind::Refresh)
    }

    fn issue(&self, user_id: &str, kind: TokenKind) -> Result<IssuedToken, TokenError> {
        let keys = self.keys(kind);
        let now = Utc::now();
        let expires_at = now + keys.ttl;
        let claims = Claims {
            user_id: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }

    /// Lifetime of a refresh token, which is also the cookie's max age
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl
    }
}
