use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use readshelf_db::{BookRecord, BookView};
use readshelf_http::{AppError, Authenticated, CurrentUser};

use super::{
    images::LocalImageHost,
    models::{BookPage, CreateBookRequest, DeleteResponse, PageQuery},
    service::BookService,
};

/// `POST /`
pub async fn create_book(
    State(books): State<Arc<BookService>>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookRecord>), AppError> {
    let Json(request) = body?;
    let book = books.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// `GET /?page&limit`. Open to cron callers as well as users.
pub async fn list_books(
    State(books): State<Arc<BookService>>,
    Authenticated(caller): Authenticated,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<BookPage>, AppError> {
    let Query(query) = query?;
    tracing::debug!(user_id = ?caller.user().map(|u| u.id), ?query, "listing books");
    books.list(query).await.map(Json)
}

/// `GET /user`
pub async fn user_books(
    State(books): State<Arc<BookService>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<BookView>>, AppError> {
    books.list_by_owner(user.id).await.map(Json)
}

/// `DELETE /{id}`
pub async fn delete_book(
    State(books): State<Arc<BookService>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    books.delete(&id, user.id).await.map(Json)
}

/// `GET /images/{file}`, public.
pub async fn serve_image(
    State(images): State<Arc<LocalImageHost>>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let image = images
        .fetch(&file)
        .await?
        .ok_or_else(|| AppError::not_found("Image not found"))?;
    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        image.bytes,
    ))
}
