use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{BookRecord, BookView, PublicUser, UserRecord};

/// Credential store.
///
/// Implementations must reject a user whose email or username is already
/// taken with [`DbError::Duplicate`], checking both atomically with the write.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, DbError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DbError>;

    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<UserRecord>, DbError>;

    /// Look a user up by id without its password hash.
    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, DbError>;
}

/// Post store. Listings are ordered newest first and expand each post's
/// owner into a [`BookView`].
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn insert_book(&self, book: BookRecord) -> Result<BookRecord, DbError>;

    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, DbError>;

    async fn list_books(&self, skip: u64, limit: u64) -> Result<Vec<BookView>, DbError>;

    async fn count_books(&self) -> Result<u64, DbError>;

    async fn list_books_by_owner(&self, owner: Uuid) -> Result<Vec<BookView>, DbError>;

    /// Returns `false` when no post had that id.
    async fn delete_book(&self, id: Uuid) -> Result<bool, DbError>;
}
