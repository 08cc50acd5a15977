pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::post, Router};
use readshelf_kernel::{InitCtx, Module};
use serde_json::json;

use self::service::AccountService;
use crate::app::Services;

/// Account registration and login, mounted at `/api/users`.
pub struct UsersModule {
    accounts: Arc<AccountService>,
}

impl UsersModule {
    pub fn new(accounts: AccountService) -> Self {
        Self {
            accounts: Arc::new(accounts),
        }
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            token_ttl_secs = ctx.settings.auth.token_ttl_secs,
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/register", post(routes::register))
            .route("/login", post(routes::login))
            .with_state(self.accounts.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        });
        let auth_response = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/AuthResponse" }
                    }
                }
            })
        };
        let with_description = |description: &str| {
            let mut response = error.clone();
            response["description"] = json!(description);
            response
        };

        Some(json!({
            "paths": {
                "/register": {
                    "post": {
                        "summary": "Register an account",
                        "tags": ["Users"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/RegisterRequest" }
                                }
                            }
                        },
                        "responses": {
                            "201": auth_response("Account created and signed in"),
                            "400": with_description("Missing fields, short password or taken email/username"),
                            "500": with_description("Internal server error")
                        }
                    }
                },
                "/login": {
                    "post": {
                        "summary": "Sign in with email and password",
                        "tags": ["Users"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/LoginRequest" }
                                }
                            }
                        },
                        "responses": {
                            "200": auth_response("Signed in"),
                            "400": with_description("Missing fields or invalid credentials"),
                            "500": with_description("Internal server error")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "RegisterRequest": {
                        "type": "object",
                        "properties": {
                            "email": { "type": "string", "format": "email" },
                            "username": { "type": "string" },
                            "password": { "type": "string", "minLength": 6 }
                        },
                        "required": ["email", "username", "password"]
                    },
                    "LoginRequest": {
                        "type": "object",
                        "properties": {
                            "email": { "type": "string", "format": "email" },
                            "password": { "type": "string" }
                        },
                        "required": ["email", "password"]
                    },
                    "PublicUser": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "email": { "type": "string", "format": "email" },
                            "username": { "type": "string" },
                            "profileImage": { "type": "string", "format": "uri" },
                            "createdAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "email", "username", "profileImage", "createdAt"]
                    },
                    "AuthResponse": {
                        "type": "object",
                        "properties": {
                            "token": { "type": "string" },
                            "user": { "$ref": "#/components/schemas/PublicUser" }
                        },
                        "required": ["token", "user"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "users module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "users module stopped");
        Ok(())
    }
}

/// Create the users module from the shared services.
pub fn create_module(services: &Services) -> Arc<dyn Module> {
    Arc::new(UsersModule::new(AccountService::new(
        services.users.clone(),
        services.tokens.clone(),
        services.hasher,
        services.clock.clone(),
    )))
}
