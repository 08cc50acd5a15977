//! readshelf application library
//!
//! Wires the users and books modules onto the shared kernel, store, and
//! auth crates. [`app::run`] is the server entry point used by both binaries.

pub mod app;
pub mod modules;
pub mod utils;

pub use app::{build_registry, run, Services};
