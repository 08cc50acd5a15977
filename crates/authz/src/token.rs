use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use readshelf_kernel::settings::AuthSettings;
use readshelf_kernel::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;
use uuid::Uuid;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Unique per token so two tokens issued in the same second differ.
    pub jti: Uuid,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error("token is malformed or its signature does not match")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token expired")]
    Expired,

    #[error("token lifetime puts expiry out of range")]
    ExpiryOutOfRange,
}

/// Issues and verifies HS256 session tokens.
///
/// Tokens are stateless: nothing is stored server side and there is no
/// refresh. Expiry is checked against the injected [`Clock`] rather than
/// the library's wall clock, and a token is rejected from its `exp` second
/// onward.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            clock,
        }
    }

    pub fn from_settings(settings: &AuthSettings, clock: Arc<dyn Clock>) -> Self {
        let ttl = Duration::seconds(i64::try_from(settings.token_ttl_secs).unwrap_or(i64::MAX));
        Self::new(settings.jwt_secret.as_bytes(), ttl, clock)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `user_id` that expires one TTL from now.
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        let now = self.clock.now();
        let expires = now
            .checked_add(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims {
            user_id,
            iat: now.unix_timestamp(),
            exp: expires.unix_timestamp(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Sign)
    }

    /// Check signature and expiry, returning the embedded claims.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(TokenError::Invalid)?
            .claims;

        if self.clock.now().unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Verify a token and return the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        self.decode(token).map(|claims| claims.user_id)
    }
}
