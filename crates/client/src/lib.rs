//! Client side of readshelf: a typed wrapper over the HTTP API and the
//! session store a UI drives its sign-in state and routing from.

pub mod api;
pub mod error;
pub mod models;
pub mod session;
pub mod storage;

pub use api::{ApiClient, AuthApi};
pub use error::ClientError;
pub use models::{AuthPayload, Book, BookOwner, BookPage, NewBook, PostedBook, User};
pub use session::{AuthOutcome, RouteGroup, SessionSnapshot, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, TOKEN_KEY, USER_KEY};
