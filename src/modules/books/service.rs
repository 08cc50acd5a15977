use std::sync::Arc;

use readshelf_db::{BookRecord, BookRepository, BookView, PublicUser};
use readshelf_http::AppError;
use readshelf_kernel::Clock;
use uuid::Uuid;

use super::images::ImageHost;
use super::models::{BookPage, CreateBookRequest, DeleteResponse, PageQuery};
use crate::utils::{present, required};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 5;
const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// Book posts: create, page through, list per owner, delete.
pub struct BookService {
    books: Arc<dyn BookRepository>,
    images: Arc<dyn ImageHost>,
    clock: Arc<dyn Clock>,
}

impl BookService {
    pub fn new(
        books: Arc<dyn BookRepository>,
        images: Arc<dyn ImageHost>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            books,
            images,
            clock,
        }
    }

    /// Upload the cover and store the post with every supplied field.
    pub async fn create(
        &self,
        owner: &PublicUser,
        request: CreateBookRequest,
    ) -> Result<BookRecord, AppError> {
        let title = present(request.title);
        let caption = present(request.caption);
        let image = present(request.image);
        let rating = request.rating;

        let (Some(title), Some(caption), Some(image), Some(rating)) =
            (title.clone(), caption.clone(), image.clone(), rating.clone())
        else {
            let details = [
                ("title", title.is_none()),
                ("caption", caption.is_none()),
                ("image", image.is_none()),
                ("rating", rating.is_none()),
            ]
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(field, _)| required(field))
            .collect();
            return Err(AppError::validation(
                details,
                "Title, caption, image and rating are required",
            ));
        };

        let rating = rating
            .value()
            .filter(|value| RATING_RANGE.contains(value))
            .ok_or_else(|| {
                AppError::validation(
                    vec![serde_json::json!({ "field": "rating", "error": "out_of_range" })],
                    "Rating must be a whole number between 1 and 5",
                )
            })?;

        let image = self.images.upload(&image).await?;
        let public_id = self.images.public_id(&image);

        let inserted = self
            .books
            .insert_book(BookRecord {
                id: Uuid::now_v7(),
                title,
                caption,
                image,
                rating: rating as u8,
                user: owner.id,
                created_at: self.clock.now(),
            })
            .await;

        let book = match inserted {
            Ok(book) => book,
            Err(err) => {
                if let Some(public_id) = public_id {
                    if let Err(cleanup) = self.images.destroy(&public_id).await {
                        tracing::warn!(image = %public_id, error = %cleanup, "failed to remove image of unsaved book");
                    }
                }
                return Err(err.into());
            }
        };

        tracing::info!(book_id = %book.id, user_id = %owner.id, "book created");
        Ok(book)
    }

    /// Newest-first page of the feed. `page` and `limit` default to 1 and 5
    /// and must be at least 1.
    pub async fn list(&self, query: PageQuery) -> Result<BookPage, AppError> {
        let page = query.page.unwrap_or(DEFAULT_PAGE);
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        if page < 1 || limit < 1 {
            return Err(AppError::validation(
                vec![serde_json::json!({ "field": "page", "error": "must be >= 1" })],
                "page and limit must be positive integers",
            ));
        }

        let (page, limit) = (page as u64, limit as u64);
        let skip = (page - 1).checked_mul(limit).ok_or_else(|| {
            AppError::validation(
                vec![serde_json::json!({ "field": "page", "error": "too_large" })],
                "page is out of range",
            )
        })?;

        let books = self.books.list_books(skip, limit).await?;
        let total_books = self.books.count_books().await?;

        Ok(BookPage {
            books,
            current_page: page,
            total_books,
            total_pages: total_books.div_ceil(limit),
        })
    }

    pub async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<BookView>, AppError> {
        Ok(self.books.list_books_by_owner(owner).await?)
    }

    /// Delete a post owned by `requester`. Removing the cover image is best
    /// effort; a failure there is logged and the post is deleted anyway.
    pub async fn delete(&self, id: &str, requester: Uuid) -> Result<DeleteResponse, AppError> {
        let not_found = || AppError::not_found("Book not found");

        let id = Uuid::parse_str(id).map_err(|_| not_found())?;
        let book = self.books.find_book(id).await?.ok_or_else(not_found)?;

        if book.user != requester {
            tracing::warn!(book_id = %id, owner = %book.user, requester = %requester, "delete refused");
            return Err(AppError::forbidden(
                "You are not authorized to delete this book",
            ));
        }

        if let Some(public_id) = self.images.public_id(&book.image) {
            if let Err(err) = self.images.destroy(&public_id).await {
                tracing::warn!(book_id = %id, image = %public_id, error = %err, "failed to delete book image");
            }
        }

        if !self.books.delete_book(id).await? {
            return Err(not_found());
        }

        tracing::info!(book_id = %id, user_id = %requester, "book deleted");
        Ok(DeleteResponse {
            message: "Book deleted successfully".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::images::LocalImageHost;
    use crate::modules::books::models::RatingInput;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use readshelf_db::MemoryStore;
    use readshelf_kernel::ManualClock;
    use time::{macros::datetime, Duration, OffsetDateTime};

    const BASE: &str = "http://localhost:8080/api/books/images";

    struct Fixture {
        service: BookService,
        store: Arc<MemoryStore>,
        images: Arc<LocalImageHost>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(datetime!(2024-06-01 09:00 UTC)));
        let store = Arc::new(MemoryStore::new());
        let images = Arc::new(LocalImageHost::new(BASE));
        Fixture {
            service: BookService::new(store.clone(), images.clone(), clock.clone()),
            store,
            images,
            clock,
        }
    }

    fn user(name: &str) -> PublicUser {
        PublicUser {
            id: Uuid::now_v7(),
            email: format!("{name}@example.com"),
            username: name.to_string(),
            profile_image: format!("https://avatars.test/{name}"),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn request(title: &str) -> CreateBookRequest {
        CreateBookRequest {
            title: Some(title.to_string()),
            caption: Some(format!("{title} is worth it")),
            image: Some(format!(
                "data:image/jpeg;base64,{}",
                STANDARD.encode(title.as_bytes())
            )),
            rating: Some(RatingInput::Text("4".to_string())),
        }
    }

    #[tokio::test]
    async fn create_persists_every_field() {
        let f = fixture();
        let owner = user("reader");
        let created = f.service.create(&owner, request("Dune")).await.unwrap();

        let stored = f.store.find_book(created.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Dune");
        assert_eq!(stored.caption, "Dune is worth it");
        assert_eq!(stored.rating, 4);
        assert_eq!(stored.user, owner.id);
        assert!(stored.image.starts_with(BASE));
        assert!(stored.image.ends_with(".jpg"));
        assert_eq!(stored.created_at, datetime!(2024-06-01 09:00 UTC));
    }

    #[tokio::test]
    async fn create_requires_all_fields() {
        let f = fixture();
        let mut missing_caption = request("Dune");
        missing_caption.caption = Some("  ".into());

        let err = f
            .service
            .create(&user("reader"), missing_caption)
            .await
            .unwrap_err();
        match err {
            AppError::Validation { details, message, .. } => {
                assert_eq!(message, "Title, caption, image and rating are required");
                assert_eq!(details, vec![required("caption")]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_rating() {
        let f = fixture();
        for rating in [RatingInput::Number(0), RatingInput::Number(6), RatingInput::Text("x".into())] {
            let mut req = request("Dune");
            req.rating = Some(rating);
            let err = f.service.create(&user("reader"), req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }
        assert_eq!(f.images.image_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_insert_removes_the_uploaded_image() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        let store = Arc::new(MemoryStore::open(sub.join("store.json")).await.unwrap());
        let images = Arc::new(LocalImageHost::with_dir(BASE, dir.path().join("images")));
        let clock = Arc::new(ManualClock::new(datetime!(2024-06-01 09:00 UTC)));
        let service = BookService::new(store.clone(), images.clone(), clock);

        std::fs::write(&sub, b"in the way").unwrap();

        let err = service.create(&user("reader"), request("Dune")).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(images.image_count().await.unwrap(), 0);
        assert_eq!(store.count_books().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn second_page_of_twelve() {
        let f = fixture();
        let owner = user("reader");
        for n in 1..=12 {
            f.service
                .create(&owner, request(&format!("Book {n}")))
                .await
                .unwrap();
            f.clock.advance(Duration::minutes(1));
        }

        let page = f
            .service
            .list(PageQuery {
                page: Some(2),
                limit: Some(5),
            })
            .await
            .unwrap();

        let titles: Vec<_> = page.books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Book 7", "Book 6", "Book 5", "Book 4", "Book 3"]);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_books, 12);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn list_defaults_and_bounds() {
        let f = fixture();
        let owner = user("reader");
        for n in 1..=7 {
            f.service
                .create(&owner, request(&format!("Book {n}")))
                .await
                .unwrap();
            f.clock.advance(Duration::seconds(1));
        }

        let first = f.service.list(PageQuery::default()).await.unwrap();
        assert_eq!(first.books.len(), 5);
        assert_eq!(first.current_page, 1);
        assert_eq!(first.total_pages, 2);

        let beyond = f
            .service
            .list(PageQuery {
                page: Some(9),
                limit: None,
            })
            .await
            .unwrap();
        assert!(beyond.books.is_empty());
        assert_eq!(beyond.total_books, 7);

        for query in [
            PageQuery { page: Some(0), limit: None },
            PageQuery { page: Some(-3), limit: None },
            PageQuery { page: None, limit: Some(0) },
        ] {
            assert!(matches!(
                f.service.list(query).await,
                Err(AppError::Validation { .. })
            ));
        }
    }

    #[tokio::test]
    async fn list_by_owner_filters_and_expands_owner() {
        let f = fixture();
        let alice = user("alice");
        let bob = user("bob");
        f.service.create(&alice, request("Emma")).await.unwrap();
        f.service.create(&bob, request("Ulysses")).await.unwrap();

        let mine = f.service.list_by_owner(alice.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Emma");
    }

    #[tokio::test]
    async fn only_the_owner_can_delete() {
        let f = fixture();
        let owner = user("owner");
        let book = f.service.create(&owner, request("Dune")).await.unwrap();

        let err = f
            .service
            .delete(&book.id.to_string(), user("intruder").id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert_eq!(f.images.image_count().await.unwrap(), 1);

        let done = f
            .service
            .delete(&book.id.to_string(), owner.id)
            .await
            .unwrap();
        assert_eq!(done.message, "Book deleted successfully");
        assert_eq!(f.images.image_count().await.unwrap(), 0);
        assert!(f.service.list(PageQuery::default()).await.unwrap().books.is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_or_malformed_id_is_not_found() {
        let f = fixture();
        let owner = user("owner");
        for id in [Uuid::now_v7().to_string(), "not-a-uuid".to_string()] {
            let err = f.service.delete(&id, owner.id).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound { .. }), "{id}");
        }
    }

    #[tokio::test]
    async fn delete_survives_image_failures() {
        let f = fixture();
        let owner = user("owner");
        let hosted = f.service.create(&owner, request("Dune")).await.unwrap();
        let id = f.images.public_id(&hosted.image).unwrap();
        f.images.destroy(&id).await.unwrap();

        let foreign = f
            .store
            .insert_book(BookRecord {
                id: Uuid::now_v7(),
                title: "Foreign".into(),
                caption: "hosted elsewhere".into(),
                image: "https://res.cloudinary.com/demo/cover.jpg".into(),
                rating: 3,
                user: owner.id,
                created_at: f.clock.now(),
            })
            .await
            .unwrap();

        for book in [hosted.id, foreign.id] {
            f.service.delete(&book.to_string(), owner.id).await.unwrap();
            assert!(f.store.find_book(book).await.unwrap().is_none());
        }
    }
}
