//! JSON API routes: likes and image uploads

pub mod images;
pub mod likes;

use crate::core::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

/// Multipart framing on top of the raw image bytes
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(max_image_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/likes/{artwork_id}",
            get(likes::get_likes).post(likes::like_artwork),
        )
        .route(
            "/api/images",
            post(images::upload_image)
                .layer(DefaultBodyLimit::max(max_image_bytes + UPLOAD_OVERHEAD_BYTES)),
        )
        .route("/api/images/{hash}", get(images::get_image))
}
