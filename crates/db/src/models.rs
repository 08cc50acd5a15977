use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored user document. Holds the password hash, so it never leaves the
/// server; handlers work with [`PublicUser`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub profile_image: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UserRecord {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            profile_image: self.profile_image.clone(),
            created_at: self.created_at,
        }
    }
}

/// User as returned to clients: everything except the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub profile_image: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Stored book post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub caption: String,
    /// Canonical URL of the uploaded cover image.
    pub image: String,
    pub rating: u8,
    /// Owning user id.
    pub user: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Public fields of a post's owner, expanded on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookOwner {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub profile_image: String,
}

impl From<&UserRecord> for BookOwner {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

/// Denormalized read model of a post. `user` is `None` when the owner
/// record no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
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

impl BookView {
    pub fn new(book: &BookRecord, owner: Option<BookOwner>) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            caption: book.caption.clone(),
            image: book.image.clone(),
            rating: book.rating,
            user: owner,
            created_at: book.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn public_user_drops_password_hash() {
        let record = UserRecord {
            id: Uuid::now_v7(),
            email: "reader@example.com".into(),
            username: "reader".into(),
            password_hash: "$2b$10$hash".into(),
            profile_image: "https://example.com/a.png".into(),
            created_at: datetime!(2024-03-01 10:00 UTC),
        };

        let json = serde_json::to_value(record.to_public()).unwrap();
        assert_eq!(json["username"], "reader");
        assert_eq!(json["profileImage"], "https://example.com/a.png");
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["createdAt"], "2024-03-01T10:00:00Z");
    }

    #[test]
    fn book_view_uses_document_field_names() {
        let owner_id = Uuid::now_v7();
        let book = BookRecord {
            id: Uuid::now_v7(),
            title: "Dune".into(),
            caption: "Spice".into(),
            image: "https://img/1.png".into(),
            rating: 5,
            user: owner_id,
            created_at: datetime!(2024-03-01 10:00 UTC),
        };
        let view = BookView::new(
            &book,
            Some(BookOwner {
                id: owner_id,
                username: "reader".into(),
                profile_image: "https://example.com/a.png".into(),
            }),
        );

        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["_id"], book.id.to_string());
        assert_eq!(json["user"]["username"], "reader");
        assert_eq!(json["user"]["profileImage"], "https://example.com/a.png");
    }
}
