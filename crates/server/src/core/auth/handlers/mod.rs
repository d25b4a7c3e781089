//! Auth Handlers

pub mod auth;
pub mod auth_me;

pub use auth::{login, logout, signup};
pub use auth_me::me;
