use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{BookOwner, BookRecord, BookView, PublicUser, UserRecord};
use crate::repository::{BookRepository, UserRepository};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    users: HashMap<Uuid, UserRecord>,
    #[serde(default)]
    books: HashMap<Uuid, BookRecord>,
}

impl Collections {
    fn view(&self, book: &BookRecord) -> BookView {
        let owner = self.users.get(&book.user).map(BookOwner::from);
        BookView::new(book, owner)
    }

    /// Books newest first; ids break ties so equal timestamps page stably.
    fn books_newest_first(&self) -> Vec<&BookRecord> {
        let mut books: Vec<&BookRecord> = self.books.values().collect();
        books.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        books
    }
}

/// In-process document store for users and books.
///
/// Every write happens under a single lock, which makes the uniqueness
/// checks on email and username atomic with the insert. With a snapshot path
/// the full collections are rewritten to disk after each mutation, and a
/// mutation whose snapshot write fails is undone before the error returns.
pub struct MemoryStore {
    inner: RwLock<Collections>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// Empty store that is never persisted.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collections::default()),
            snapshot: None,
        }
    }

    /// Open a store backed by a JSON snapshot, loading it when the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        let collections = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Collections::default(),
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            path = %path.display(),
            users = collections.users.len(),
            books = collections.books.len(),
            "document store loaded"
        );

        Ok(Self {
            inner: RwLock::new(collections),
            snapshot: Some(path),
        })
    }

    /// Rewrite the snapshot file. Called with the write lock held so that
    /// snapshots land on disk in mutation order.
    async fn persist(&self, collections: &Collections) -> Result<(), DbError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(collections)?;
        let tmp = path.with_extension("tmp");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord, DbError> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.email == user.email) {
            return Err(DbError::Duplicate { field: "email" });
        }
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(DbError::Duplicate { field: "username" });
        }
        if inner.users.contains_key(&user.id) {
            return Err(DbError::Duplicate { field: "id" });
        }

        inner.users.insert(user.id, user.clone());
        if let Err(err) = self.persist(&inner).await {
            inner.users.remove(&user.id);
            return Err(err);
        }
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).map(UserRecord::to_public))
    }
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn insert_book(&self, book: BookRecord) -> Result<BookRecord, DbError> {
        let mut inner = self.inner.write().await;
        if inner.books.contains_key(&book.id) {
            return Err(DbError::Duplicate { field: "_id" });
        }
        inner.books.insert(book.id, book.clone());
        if let Err(err) = self.persist(&inner).await {
            inner.books.remove(&book.id);
            return Err(err);
        }
        Ok(book)
    }

    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner.books.get(&id).cloned())
    }

    async fn list_books(&self, skip: u64, limit: u64) -> Result<Vec<BookView>, DbError> {
        let inner = self.inner.read().await;
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(inner
            .books_newest_first()
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|book| inner.view(book))
            .collect())
    }

    async fn count_books(&self) -> Result<u64, DbError> {
        let inner = self.inner.read().await;
        Ok(inner.books.len() as u64)
    }

    async fn list_books_by_owner(&self, owner: Uuid) -> Result<Vec<BookView>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner
            .books_newest_first()
            .into_iter()
            .filter(|book| book.user == owner)
            .map(|book| inner.view(book))
            .collect())
    }

    async fn delete_book(&self, id: Uuid) -> Result<bool, DbError> {
        let mut inner = self.inner.write().await;
        let Some(removed) = inner.books.remove(&id) else {
            return Ok(false);
        };
        if let Err(err) = self.persist(&inner).await {
            inner.books.insert(id, removed);
            return Err(err);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::{macros::datetime, Duration, OffsetDateTime};

    fn user(email: &str, username: &str) -> UserRecord {
        UserRecord {
            id: Uuid::now_v7(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$2b$04$hash".to_string(),
            profile_image: format!("https://avatars.test/{username}"),
            created_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    fn book(owner: Uuid, title: &str, created_at: OffsetDateTime) -> BookRecord {
        BookRecord {
            id: Uuid::now_v7(),
            title: title.to_string(),
            caption: format!("{title} caption"),
            image: format!("https://img.test/{title}.png"),
            rating: 4,
            user: owner,
            created_at,
        }
    }

    #[tokio::test]
    async fn duplicate_email_and_username_are_rejected() {
        let store = MemoryStore::new();
        store.insert_user(user("a@x.io", "alice")).await.unwrap();

        let err = store.insert_user(user("a@x.io", "other")).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate { field: "email" }));

        let err = store.insert_user(user("b@x.io", "alice")).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate { field: "username" }));
    }

    #[tokio::test]
    async fn concurrent_registrations_admit_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_user(user("same@x.io", &format!("user{i}")))
                        .await
                })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn profile_lookup_excludes_hash() {
        let store = MemoryStore::new();
        let stored = store.insert_user(user("a@x.io", "alice")).await.unwrap();

        let profile = store.find_profile(stored.id).await.unwrap().unwrap();
        assert_eq!(profile.username, "alice");
        assert!(store.find_profile(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_pages_newest_first_with_owner_expanded() {
        let store = MemoryStore::new();
        let owner = store.insert_user(user("a@x.io", "alice")).await.unwrap();
        let start = datetime!(2024-01-01 00:00 UTC);
        for i in 0..12 {
            store
                .insert_book(book(owner.id, &format!("b{i}"), start + Duration::minutes(i)))
                .await
                .unwrap();
        }

        let page = store.list_books(5, 5).await.unwrap();
        let titles: Vec<_> = page.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["b6", "b5", "b4", "b3", "b2"]);
        assert_eq!(page[0].user.as_ref().unwrap().username, "alice");
        assert_eq!(store.count_books().await.unwrap(), 12);

        assert!(store.list_books(20, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_listing_filters_and_missing_owner_is_none() {
        let store = MemoryStore::new();
        let alice = store.insert_user(user("a@x.io", "alice")).await.unwrap();
        let ghost = Uuid::now_v7();
        let start = datetime!(2024-01-01 00:00 UTC);
        store.insert_book(book(alice.id, "mine", start)).await.unwrap();
        store
            .insert_book(book(ghost, "orphan", start + Duration::minutes(1)))
            .await
            .unwrap();

        let mine = store.list_books_by_owner(alice.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "mine");

        let all = store.list_books(0, 10).await.unwrap();
        assert_eq!(all[0].title, "orphan");
        assert!(all[0].user.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_book_was_removed() {
        let store = MemoryStore::new();
        let stored = store
            .insert_book(book(Uuid::now_v7(), "gone", datetime!(2024-01-01 00:00 UTC)))
            .await
            .unwrap();

        assert!(store.delete_book(stored.id).await.unwrap());
        assert!(!store.delete_book(stored.id).await.unwrap());
        assert!(store.find_book(stored.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let stored = {
            let store = MemoryStore::open(&path).await.unwrap();
            let owner = store.insert_user(user("a@x.io", "alice")).await.unwrap();
            store
                .insert_book(book(owner.id, "kept", datetime!(2024-01-01 00:00 UTC)))
                .await
                .unwrap()
        };

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert_eq!(reopened.find_book(stored.id).await.unwrap(), Some(stored));
        assert!(reopened
            .find_user_by_email("a@x.io")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        let store = MemoryStore::open(sub.join("store.json")).await.unwrap();
        let owner = store.insert_user(user("a@x.io", "alice")).await.unwrap();
        let kept = store
            .insert_book(book(owner.id, "kept", datetime!(2024-01-01 00:00 UTC)))
            .await
            .unwrap();

        std::fs::remove_dir_all(&sub).unwrap();
        std::fs::write(&sub, b"in the way").unwrap();

        assert!(matches!(
            store.insert_user(user("b@x.io", "bob")).await,
            Err(DbError::Io(_))
        ));
        assert!(store.find_user_by_email("b@x.io").await.unwrap().is_none());

        let lost = book(owner.id, "lost", datetime!(2024-01-02 00:00 UTC));
        assert!(store.insert_book(lost.clone()).await.is_err());
        assert!(store.find_book(lost.id).await.unwrap().is_none());

        assert!(store.delete_book(kept.id).await.is_err());
        assert_eq!(store.find_book(kept.id).await.unwrap(), Some(kept));
        assert_eq!(store.count_books().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = MemoryStore::open(&path).await.err().unwrap();
        assert!(matches!(err, DbError::Corrupt(_)));
    }
}
