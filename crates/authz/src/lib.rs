//! Identity for readshelf requests.
//!
//! - [`TokenService`] issues and verifies signed, time-limited session tokens.
//! - [`PasswordHasher`] salts and hashes passwords with bcrypt.
//! - [`AccessGuard`] turns request credentials into a [`Caller`] or a
//!   rejection.

pub mod guard;
pub mod password;
pub mod token;

pub use guard::{AccessGuard, AuthError, Caller, CRON_SECRET_HEADER};
pub use password::{PasswordError, PasswordHasher};
pub use token::{Claims, TokenError, TokenService};
