use crate::core::auth::IdentityProvider;
use crate::core::{AppState, Ctx, Error, Result};
use crate::gallery::models::{Artwork, ArtworkView, GalleryPage, NewArtwork, OwnerInfo};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /artworks - the caller's own artworks
pub async fn list_mine(State(state): State<AppState>, ctx: Ctx) -> Result<Json<Vec<Artwork>>> {
    info!("GET /artworks - user {}", ctx.user_id());
    Ok(Json(state.artworks.list_by_owner(ctx.user_id()).await?))
}

/// POST /artworks
pub async fn create_artwork(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(new): Json<NewArtwork>,
) -> Result<(StatusCode, Json<Artwork>)> {
    info!("POST /artworks - user {}", ctx.user_id());

    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::BadRequest("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::BadRequest(format!(
            "Title longer than {} characters",
            MAX_TITLE_LEN
        )));
    }
    if !state.images.contains(&new.image_hash).await? {
        return Err(Error::BadRequest(format!(
            "Unknown image {}; upload it to /api/images first",
            new.image_hash
        )));
    }

    let artwork = state.artworks.create(ctx.user_id(), new).await?;
    Ok((StatusCode::CREATED, Json(artwork)))
}

/// GET /artworks/{id}
pub async fn get_artwork(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    ctx: Option<Ctx>,
) -> Result<Json<ArtworkView>> {
    let artwork = state
        .artworks
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Artwork {} not found", id)))?;

    // The owner is a weak reference; a failed lookup just omits it
    let owner = match state.auth.load_by_id(artwork.owner_id).await {
        Ok(user) => user.map(OwnerInfo::from),
        Err(e) => {
            warn!("[Gallery] Owner lookup for artwork {} failed: {}", id, e);
            None
        }
    };

    let liked_by_me = match ctx {
        Some(ctx) => Some(state.artworks.has_liked(id, ctx.user_id()).await?),
        None => None,
    };

    Ok(Json(ArtworkView::new(artwork, owner, liked_by_me)))
}

/// DELETE /artworks/{id}
pub async fn delete_artwork(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<StatusCode> {
    info!("DELETE /artworks/{} - user {}", id, ctx.user_id());

    let artwork = state.artworks.delete(ctx.user_id(), id).await?;

    // Images are deduplicated, so only drop the file once nothing uses it
    if !state.artworks.image_in_use(&artwork.image_hash).await? {
        if let Err(e) = state.images.delete(&artwork.image_hash).await {
            warn!(
                "[Gallery] Failed to remove image {}: {}",
                artwork.image_hash, e
            );
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /gallery?page=&per_page=
pub async fn gallery_page(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<GalleryPage>> {
    let page = params.page.unwrap_or(1);
    let per_page = params.per_page.unwrap_or(20);
    Ok(Json(state.artworks.list_page(page, per_page).await?))
}

/// GET /gallery/user/{user_id}
pub async fn gallery_by_user(
    Path(user_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Artwork>>> {
    let items = state.artworks.list_by_owner(user_id).await?;
    if items.is_empty() && state.auth.load_by_id(user_id).await?.is_none() {
        return Err(Error::NotFound(format!("User {} not found", user_id)));
    }
    Ok(Json(items))
}
