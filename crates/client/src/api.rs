use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ClientError;
use crate::models::{AuthPayload, Book, BookPage, NewBook, PostedBook};

/// Account calls the session store needs. Lets the store run against a fake
/// in tests.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthPayload, ClientError>;

    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ClientError>;
}

/// HTTP client for the readshelf API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8080/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_books(
        &self,
        token: &str,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<BookPage, ClientError> {
        let mut query = Vec::new();
        if let Some(page) = page {
            query.push(("page", page));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit));
        }
        let request = self
            .http
            .get(self.url("/books"))
            .bearer_auth(token)
            .query(&query);
        send(request, "Failed to load books").await
    }

    pub async fn user_books(&self, token: &str) -> Result<Vec<Book>, ClientError> {
        let request = self.http.get(self.url("/books/user")).bearer_auth(token);
        send(request, "Failed to load your books").await
    }

    pub async fn create_book(&self, token: &str, book: &NewBook) -> Result<PostedBook, ClientError> {
        let request = self
            .http
            .post(self.url("/books"))
            .bearer_auth(token)
            .json(book);
        send(request, "Failed to create book").await
    }

    /// Returns the server's confirmation message.
    pub async fn delete_book(&self, token: &str, id: Uuid) -> Result<String, ClientError> {
        #[derive(Deserialize)]
        struct Deleted {
            message: String,
        }

        let request = self
            .http
            .delete(self.url(&format!("/books/{id}")))
            .bearer_auth(token);
        let deleted: Deleted = send(request, "Failed to delete book").await?;
        Ok(deleted.message)
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthPayload, ClientError> {
        let request = self.http.post(self.url("/users/register")).json(&json!({
            "username": username,
            "email": email,
            "password": password,
        }));
        send(request, "Registration failed").await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ClientError> {
        let request = self.http.post(self.url("/users/login")).json(&json!({
            "email": email,
            "password": password,
        }));
        send(request, "Login failed").await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder, fallback: &str) -> Result<T, ClientError> {
    let response = request.send().await?;
    decode(response, fallback).await
}

async fn decode<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "api call failed");
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or_else(|| fallback.to_string()),
        });
    }

    serde_json::from_str(&body).map_err(|err| {
        if body.trim().is_empty() {
            ClientError::Decode(fallback.to_string())
        } else {
            ClientError::Decode(err.to_string())
        }
    })
}

/// Pull a human readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; a non-JSON body is used verbatim.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Some(body.to_string());
    };

    let error = &value["error"];
    error["message"]
        .as_str()
        .or_else(|| error.as_str())
        .or_else(|| value["message"].as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"code":"conflict","message":"User already exists"}}"#),
            Some("User already exists".to_string())
        );
        assert_eq!(
            error_message(r#"{"error":"Internal Server Error"}"#),
            Some("Internal Server Error".to_string())
        );
        assert_eq!(
            error_message(r#"{"message":"Invalid credentials"}"#),
            Some("Invalid credentials".to_string())
        );
        assert_eq!(error_message("Bad Gateway"), Some("Bad Gateway".to_string()));
        assert_eq!(error_message("{}"), None);
        assert_eq!(error_message("  "), None);
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/api/");
        assert_eq!(client.base_url(), "http://localhost:8080/api");
        assert_eq!(client.url("/books"), "http://localhost:8080/api/books");
    }
}
