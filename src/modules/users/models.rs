use readshelf_db::PublicUser;
use serde::{Deserialize, Serialize};

/// Body of `POST /register`. Fields are optional so a missing field gets the
/// API's own validation message instead of a deserializer error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Body of `POST /login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Session token plus the public user it was issued for.
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}
