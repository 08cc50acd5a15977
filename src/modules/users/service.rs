use std::sync::Arc;

use readshelf_authz::{PasswordHasher, TokenService};
use readshelf_db::{DbError, UserRecord, UserRepository};
use readshelf_http::AppError;
use readshelf_kernel::Clock;
use uuid::Uuid;

use super::models::{AuthResponse, LoginRequest, RegisterRequest};
use crate::utils::{default_avatar_url, present, required};

const MIN_PASSWORD_LEN: usize = 6;
const EMAIL_TAKEN: &str = "User already exists";
const USERNAME_TAKEN: &str = "Username already exists";

/// Registration and login.
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        hasher: PasswordHasher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            clock,
        }
    }

    /// Create an account and sign it in.
    ///
    /// Email conflicts are reported before username conflicts. The store
    /// rejects a duplicate that slips in between the check and the insert.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AppError> {
        let (email, username, password) = match (
            present(request.email),
            present(request.username),
            request.password.filter(|p| !p.is_empty()),
        ) {
            (Some(email), Some(username), Some(password)) => (email, username, password),
            (email, username, password) => {
                let mut details = Vec::new();
                if email.is_none() {
                    details.push(required("email"));
                }
                if username.is_none() {
                    details.push(required("username"));
                }
                if password.is_none() {
                    details.push(required("password"));
                }
                return Err(AppError::validation(
                    details,
                    "Email, username and password are required",
                ));
            }
        };

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(
                vec![serde_json::json!({ "field": "password", "error": "too_short" })],
                format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
            ));
        }

        let email_taken = self.users.find_user_by_email(&email).await?.is_some();
        let username_taken = self.users.find_user_by_username(&username).await?.is_some();
        if email_taken {
            return Err(conflict("email", EMAIL_TAKEN));
        }
        if username_taken {
            return Err(conflict("username", USERNAME_TAKEN));
        }

        let record = UserRecord {
            id: Uuid::now_v7(),
            profile_image: default_avatar_url(&username),
            password_hash: self.hasher.hash(&password).await?,
            email,
            username,
            created_at: self.clock.now(),
        };

        let user = self.users.insert_user(record).await.map_err(|err| match err {
            DbError::Duplicate { field: "email" } => conflict("email", EMAIL_TAKEN),
            DbError::Duplicate { field: "username" } => conflict("username", USERNAME_TAKEN),
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");

        Ok(AuthResponse {
            token: self.tokens.issue(user.id)?,
            user: user.to_public(),
        })
    }

    /// Exchange email and password for a fresh token.
    ///
    /// An unknown email and a wrong password produce the same error.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        let (Some(email), Some(password)) = (
            present(request.email),
            request.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::validation(
                vec![required("email"), required("password")],
                "Email and password are required",
            ));
        };

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            return Err(invalid_credentials());
        };

        if !self.hasher.verify(&password, &user.password_hash).await? {
            return Err(invalid_credentials());
        }

        tracing::info!(user_id = %user.id, "user logged in");

        Ok(AuthResponse {
            token: self.tokens.issue(user.id)?,
            user: user.to_public(),
        })
    }
}

fn conflict(field: &str, message: &str) -> AppError {
    AppError::conflict(
        vec![serde_json::json!({ "field": field, "error": "taken" })],
        message,
    )
}

fn invalid_credentials() -> AppError {
    AppError::BadRequest {
        message: "Invalid credentials".to_string(),
        code: "invalid_credentials".to_string(),
    }
}
