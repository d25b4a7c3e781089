//! Core Service Layer
//!
//! Shared infrastructure for the gallery server: authentication,
//! configuration, database setup and the web error type.

pub mod auth;
pub mod config;
pub mod ctx;
pub mod db;
pub mod error;
pub mod router;

// Re-exports for convenience
pub use config::{AppState, ServerConfig};
pub use ctx::Ctx;
pub use error::{Error, Result};
pub use router::router;
