//! Persistence for readshelf: user credentials and book posts.
//!
//! Callers depend on the [`UserRepository`] and [`BookRepository`] traits.
//! [`MemoryStore`] implements both over an in-process document store that can
//! optionally write through to a JSON snapshot file.

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

pub use error::DbError;
pub use memory::MemoryStore;
pub use models::{BookOwner, BookRecord, BookView, PublicUser, UserRecord};
pub use repository::{BookRepository, UserRepository};
