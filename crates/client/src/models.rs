use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Signed-in user as the API returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub profile_image: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Answer of register and login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookOwner {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub profile_image: String,
}

/// Feed entry with its owner expanded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub caption: String,
    pub image: String,
    pub rating: u8,
    pub user: Option<BookOwner>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Post as returned by create, owner as a bare id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedBook {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub caption: String,
    pub image: String,
    pub rating: u8,
    pub user: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPage {
    pub books: Vec<Book>,
    pub current_page: u64,
    pub total_books: u64,
    pub total_pages: u64,
}

/// Body of a new post. `image` is a base64 `data:` URL.
#[derive(Debug, Clone, Serialize)]
pub struct NewBook {
    pub title: String,
    pub caption: String,
    pub image: String,
    pub rating: u8,
}
