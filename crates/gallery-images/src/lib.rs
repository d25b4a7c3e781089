//! Content-addressed image storage.
//!
//! Image bytes live on disk under their SHA-256 hash; metadata (content type,
//! original filename, size) lives in a small SQLite table next to them.

mod store;

pub use store::{atomic_write, content_hash, is_valid_hash, ImageError, ImageMeta, ImageStore, Result};
