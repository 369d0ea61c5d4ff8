//! HS256 bearer tokens binding requests to a user identity.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// The authenticated caller, as resolved from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
}

/// Claims carried in issued tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    /// User id in storage.
    pub uid: i64,
    /// Issued-at, seconds since epoch.
    pub iat: u64,
    /// Expiry, seconds since epoch.
    pub exp: u64,
}

/// Issues and verifies bearer tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    /// Issue a token for a user.
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, AuthError> {
        let now = unix_now();
        let claims = Claims {
            sub: username.to_string(),
            uid: user_id,
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenIssuance(e.to_string()))
    }

    /// Strip the `Bearer ` scheme from an Authorization header value.
    pub fn extract_bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
        let raw = header_value.ok_or(AuthError::Unauthenticated)?;
        let token = raw
            .trim()
            .strip_prefix("Bearer ")
            .ok_or(AuthError::Unauthenticated)?
            .trim();
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }
        Ok(token)
    }

    /// Verify a raw Authorization header and resolve the caller.
    ///
    /// Must be called before any reconciliation or query operation; the
    /// returned identity is trusted downstream without re-verification.
    pub fn authorize(&self, header_value: Option<&str>) -> Result<UserIdentity, AuthError> {
        let token = Self::extract_bearer_token(header_value)?;
        let claims = self.decode(token)?;
        Ok(UserIdentity {
            id: claims.uid,
            username: claims.sub,
        })
    }

    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Err(AuthError::CredentialExpired),
                _ => Err(AuthError::InvalidCredential),
            },
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
