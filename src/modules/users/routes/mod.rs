use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use readshelf_http::AppError;

use super::{
    models::{AuthResponse, LoginRequest, RegisterRequest},
    service::AccountService,
};

/// `POST /register`
pub async fn register(
    State(accounts): State<Arc<AccountService>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(request) = body?;
    let response = accounts.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /login`
pub async fn login(
    State(accounts): State<Arc<AccountService>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(request) = body?;
    accounts.login(request).await.map(Json)
}
