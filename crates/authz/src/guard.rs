use std::sync::Arc;

use readshelf_db::{DbError, PublicUser, UserRepository};
use thiserror::Error;

use crate::token::TokenService;

/// Header trusted automated callers use instead of a bearer token.
pub const CRON_SECRET_HEADER: &str = "x-cron-job-secret";

const BEARER_PREFIX: &str = "Bearer ";

/// Identity attached to an admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// A signed-in user resolved from a bearer token.
    User(PublicUser),
    /// A trusted automated caller admitted by the cron secret. Carries no
    /// user identity.
    Service,
}

impl Caller {
    pub fn user(&self) -> Option<&PublicUser> {
        match self {
            Caller::User(user) => Some(user),
            Caller::Service => None,
        }
    }
}

/// Reasons a protected request is turned away. Every variant except
/// `Store` is a 401 with its own message.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token provided")]
    NoToken,

    #[error("Invalid auth format")]
    InvalidFormat,

    #[error("Token is missing")]
    TokenMissing,

    #[error("Token is not valid")]
    TokenInvalid,

    #[error("User not found")]
    UserNotFound,

    #[error("user lookup failed: {0}")]
    Store(#[from] DbError),
}

/// Gate in front of every protected route.
pub struct AccessGuard {
    tokens: Arc<TokenService>,
    users: Arc<dyn UserRepository>,
    cron_secret: Option<String>,
}

impl AccessGuard {
    pub fn new(
        tokens: Arc<TokenService>,
        users: Arc<dyn UserRepository>,
        cron_secret: Option<String>,
    ) -> Self {
        Self {
            tokens,
            users,
            cron_secret: cron_secret.filter(|secret| !secret.is_empty()),
        }
    }

    /// Decide whether a request may proceed.
    ///
    /// `authorization` is the raw `Authorization` header and `cron_secret` the
    /// raw `x-cron-job-secret` header. The cron secret is only consulted when
    /// no `Authorization` header was sent.
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        cron_secret: Option<&str>,
    ) -> Result<Caller, AuthError> {
        let Some(header) = authorization else {
            return match (self.cron_secret.as_deref(), cron_secret) {
                (Some(expected), Some(presented)) if expected == presented => {
                    tracing::info!("cron job request allowed");
                    Ok(Caller::Service)
                }
                _ => Err(AuthError::NoToken),
            };
        };

        let rest = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthError::InvalidFormat)?;
        let token = rest.split(' ').next().unwrap_or_default();
        if token.is_empty() {
            return Err(AuthError::TokenMissing);
        }

        let user_id = self.tokens.verify(token).map_err(|err| {
            tracing::warn!(error = %err, "rejected session token");
            AuthError::TokenInvalid
        })?;

        let user = self
            .users
            .find_profile(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(Caller::User(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readshelf_db::{MemoryStore, UserRecord};
    use readshelf_kernel::{Clock, ManualClock};
    use time::{macros::datetime, Duration};
    use uuid::Uuid;

    struct Fixture {
        guard: AccessGuard,
        tokens: Arc<TokenService>,
        clock: Arc<ManualClock>,
        user: UserRecord,
    }

    async fn fixture(cron_secret: Option<&str>) -> Fixture {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let tokens = Arc::new(TokenService::new(
            b"guard-secret",
            Duration::hours(1),
            clock.clone(),
        ));
        let store = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(UserRecord {
                id: Uuid::now_v7(),
                email: "reader@example.com".into(),
                username: "reader".into(),
                password_hash: "$2b$04$hash".into(),
                profile_image: "https://avatars.test/reader".into(),
                created_at: clock.now(),
            })
            .await
            .unwrap();

        Fixture {
            guard: AccessGuard::new(tokens.clone(), store, cron_secret.map(str::to_string)),
            tokens,
            clock,
            user,
        }
    }

    #[tokio::test]
    async fn valid_bearer_token_resolves_user() {
        let f = fixture(None).await;
        let token = f.tokens.issue(f.user.id).unwrap();

        let caller = f
            .guard
            .authorize(Some(&format!("Bearer {token}")), None)
            .await
            .unwrap();
        assert_eq!(caller.user().unwrap().username, "reader");
    }

    #[tokio::test]
    async fn missing_header_without_cron_secret_is_rejected() {
        let f = fixture(Some("cron-secret")).await;
        let err = f.guard.authorize(None, None).await.unwrap_err();
        assert!(matches!(err, AuthError::NoToken));
        assert_eq!(err.to_string(), "No token provided");
    }

    #[tokio::test]
    async fn matching_cron_secret_admits_service_caller() {
        let f = fixture(Some("cron-secret")).await;
        let caller = f.guard.authorize(None, Some("cron-secret")).await.unwrap();
        assert_eq!(caller, Caller::Service);

        let err = f.guard.authorize(None, Some("guess")).await.unwrap_err();
        assert!(matches!(err, AuthError::NoToken));
    }

    #[tokio::test]
    async fn cron_bypass_is_off_when_unconfigured() {
        let f = fixture(None).await;
        assert!(f.guard.authorize(None, Some("")).await.is_err());
        assert!(f.guard.authorize(None, Some("anything")).await.is_err());
    }

    #[tokio::test]
    async fn cron_secret_is_ignored_when_authorization_is_present() {
        let f = fixture(Some("cron-secret")).await;
        let err = f
            .guard
            .authorize(Some("Basic abc"), Some("cron-secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidFormat));
    }

    #[tokio::test]
    async fn bearer_without_token_is_missing() {
        let f = fixture(None).await;
        let err = f.guard.authorize(Some("Bearer "), None).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenMissing));
    }

    #[tokio::test]
    async fn garbage_and_expired_tokens_are_invalid() {
        let f = fixture(None).await;
        let err = f
            .guard
            .authorize(Some("Bearer not-a-jwt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));

        let token = f.tokens.issue(f.user.id).unwrap();
        f.clock.advance(Duration::hours(1));
        let err = f
            .guard
            .authorize(Some(&format!("Bearer {token}")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn token_for_unknown_user_is_rejected() {
        let f = fixture(None).await;
        let token = f.tokens.issue(Uuid::now_v7()).unwrap();
        let err = f
            .guard
            .authorize(Some(&format!("Bearer {token}")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }
}
