pub mod images;
pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use readshelf_authz::AccessGuard;
use readshelf_http::require_auth;
use readshelf_kernel::{InitCtx, Module};
use serde_json::json;

use self::{images::LocalImageHost, service::BookService};
use crate::app::Services;

/// Book posts, mounted at `/api/books`. Every route except the public image
/// route sits behind the access guard.
pub struct BooksModule {
    books: Arc<BookService>,
    images: Arc<LocalImageHost>,
    guard: Arc<AccessGuard>,
}

impl BooksModule {
    pub fn new(books: BookService, images: Arc<LocalImageHost>, guard: Arc<AccessGuard>) -> Self {
        Self {
            books: Arc::new(books),
            images,
            guard,
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            cron_bypass = ctx.settings.auth.cron_secret.is_some(),
            image_base_url = %ctx.settings.images.public_base_url,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        let protected = Router::new()
            .route("/", get(routes::list_books).post(routes::create_book))
            .route("/user", get(routes::user_books))
            .route("/{id}", delete(routes::delete_book))
            .route_layer(middleware::from_fn_with_state(
                self.guard.clone(),
                require_auth,
            ))
            .with_state(self.books.clone());

        let public = Router::new()
            .route("/images/{file}", get(routes::serve_image))
            .with_state(self.images.clone());

        protected.merge(public)
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let security = json!([{ "bearer": [] }, { "cron": [] }]);

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Page through the feed, newest first",
                        "tags": ["Books"],
                        "security": security,
                        "parameters": [
                            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1, "default": 1 } },
                            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "default": 5 } }
                        ],
                        "responses": {
                            "200": {
                                "description": "One page of posts",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookPage" }
                                    }
                                }
                            },
                            "400": error("page or limit below 1"),
                            "401": error("Missing or invalid credentials"),
                            "500": error("Internal server error")
                        }
                    },
                    "post": {
                        "summary": "Recommend a book",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateBook" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Post created",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": error("Missing fields, bad rating or bad image"),
                            "401": error("Missing or invalid credentials"),
                            "403": error("Caller has no user identity"),
                            "500": error("Internal server error")
                        }
                    }
                },
                "/user": {
                    "get": {
                        "summary": "Posts of the signed-in user",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "responses": {
                            "200": {
                                "description": "All of the caller's posts, newest first",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/BookView" }
                                        }
                                    }
                                }
                            },
                            "401": error("Missing or invalid credentials"),
                            "403": error("Caller has no user identity"),
                            "500": error("Internal server error")
                        }
                    }
                },
                "/{id}": {
                    "delete": {
                        "summary": "Delete one of your posts",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "Deleted",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": { "message": { "type": "string" } },
                                            "required": ["message"]
                                        }
                                    }
                                }
                            },
                            "401": error("Missing or invalid credentials"),
                            "403": error("Not the owner of the post"),
                            "404": error("Book not found"),
                            "500": error("Internal server error")
                        }
                    }
                },
                "/images/{file}": {
                    "get": {
                        "summary": "Cover image",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "file", "in": "path", "required": true, "schema": { "type": "string" } }
                        ],
                        "responses": {
                            "200": { "description": "Image bytes" },
                            "404": error("Image not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "caption": { "type": "string" },
                            "image": { "type": "string", "description": "base64 data URL" },
                            "rating": {
                                "oneOf": [
                                    { "type": "integer", "minimum": 1, "maximum": 5 },
                                    { "type": "string" }
                                ]
                            }
                        },
                        "required": ["title", "caption", "image", "rating"]
                    },
                    "Book": {
                        "type": "object",
                        "properties": {
                            "_id": { "type": "string", "format": "uuid" },
                            "title": { "type": "string" },
                            "caption": { "type": "string" },
                            "image": { "type": "string", "format": "uri" },
                            "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "user": { "type": "string", "format": "uuid" },
                            "createdAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["_id", "title", "caption", "image", "rating", "user", "createdAt"]
                    },
                    "BookOwner": {
                        "type": "object",
                        "properties": {
                            "_id": { "type": "string", "format": "uuid" },
                            "username": { "type": "string" },
                            "profileImage": { "type": "string", "format": "uri" }
                        },
                        "required": ["_id", "username", "profileImage"]
                    },
                    "BookView": {
                        "type": "object",
                        "properties": {
                            "_id": { "type": "string", "format": "uuid" },
                            "title": { "type": "string" },
                            "caption": { "type": "string" },
                            "image": { "type": "string", "format": "uri" },
                            "rating": { "type": "integer" },
                            "user": {
                                "nullable": true,
                                "allOf": [{ "$ref": "#/components/schemas/BookOwner" }]
                            },
                            "createdAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["_id", "title", "caption", "image", "rating", "user", "createdAt"]
                    },
                    "BookPage": {
                        "type": "object",
                        "properties": {
                            "books": { "type": "array", "items": { "$ref": "#/components/schemas/BookView" } },
                            "currentPage": { "type": "integer" },
                            "totalBooks": { "type": "integer" },
                            "totalPages": { "type": "integer" }
                        },
                        "required": ["books", "currentPage", "totalBooks", "totalPages"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module from the shared services.
pub fn create_module(services: &Services) -> Arc<dyn Module> {
    let books = BookService::new(
        services.books.clone(),
        services.images.clone(),
        services.clock.clone(),
    );
    Arc::new(BooksModule::new(
        books,
        services.images.clone(),
        services.guard.clone(),
    ))
}
