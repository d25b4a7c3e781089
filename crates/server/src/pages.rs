//! HTML pages: the landing page and the 404 page.

use crate::core::{AppState, Error};
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use tracing::{debug, warn};

const PAGE_STYLE: &str =
    "body{font-family:sans-serif;max-width:40rem;margin:4rem auto;padding:0 1rem;color:#222}a{color:#5a3ea1}";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title><style>{PAGE_STYLE}</style></head><body>{body}</body></html>"
    )
}

/// GET /
pub async fn home(State(state): State<AppState>) -> Html<String> {
    let count = match state.artworks.count().await {
        Ok(count) => count.to_string(),
        Err(e) => {
            warn!("Home page count failed: {}", e);
            "Many".to_string()
        }
    };

    Html(layout(
        "Gallery",
        &format!(
            "<h1>Gallery</h1>\
             <p>{count} artworks shared so far.</p>\
             <ul>\
             <li><a href=\"/gallery\">Browse the gallery</a></li>\
             <li><a href=\"/artworks\">Your artworks</a></li>\
             </ul>"
        ),
    ))
}

/// Fallback for unknown routes: a rendered 404 page, or a JSON error
/// under `/api/`.
pub async fn not_found(uri: Uri) -> Response {
    debug!("404 {}", uri.path());

    if uri.path().starts_with("/api/") {
        return Error::NotFound(format!("No route for {}", uri.path())).into_response();
    }

    (
        StatusCode::NOT_FOUND,
        Html(layout(
            "Page not found",
            "<h1>Page not found</h1>\
             <p>The page you asked for does not exist.</p>\
             <p><a href=\"/\">Back to the gallery</a></p>",
        )),
    )
        .into_response()
}
