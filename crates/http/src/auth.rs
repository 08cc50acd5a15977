//! Route protection: the middleware that runs the [`AccessGuard`] and the
//! extractors handlers use to read the admitted caller.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use readshelf_authz::{AccessGuard, Caller, CRON_SECRET_HEADER};
use readshelf_db::PublicUser;

use crate::error::AppError;

/// Middleware for protected routers:
/// `router.route_layer(middleware::from_fn_with_state(guard, require_auth))`.
///
/// A non UTF-8 `Authorization` header counts as present but malformed.
pub async fn require_auth(
    State(guard): State<Arc<AccessGuard>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let authorization = headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());
    let cron_secret = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    let caller = guard.authorize(authorization, cron_secret).await?;

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Any admitted caller, user or cron job.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| {
                tracing::warn!("caller missing from request extensions; is require_auth mounted?");
                AppError::unauthorized("No token provided")
            })
    }
}

/// The signed-in user. Cron callers carry no user and are refused with 403.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(caller) = Authenticated::from_request_parts(parts, state).await?;
        match caller {
            Caller::User(user) => Ok(CurrentUser(user)),
            Caller::Service => Err(AppError::forbidden(
                "This operation requires a signed-in user",
            )),
        }
    }
}
