//! Artworks and the gallery view
//!
//! `/artworks` manages a user's own pieces, `/gallery` browses everyone's.

pub mod handlers;
pub mod models;
pub mod store;

use crate::core::AppState;
use axum::{routing::get, Router};

pub use models::{Artwork, ArtworkView, GalleryPage, NewArtwork};
pub use store::{ArtworkStore, SqliteArtworkStore, StoreError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/artworks",
            get(handlers::list_mine).post(handlers::create_artwork),
        )
        .route(
            "/artworks/{id}",
            get(handlers::get_artwork).delete(handlers::delete_artwork),
        )
        .route("/gallery", get(handlers::gallery_page))
        .route("/gallery/user/{user_id}", get(handlers::gallery_by_user))
}
