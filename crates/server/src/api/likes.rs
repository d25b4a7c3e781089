//! Likes API
//!
//! Liking goes through the notification hub so every connected viewer
//! hears about the new count.

use crate::core::{AppState, Ctx, Result};
use crate::realtime::LikeEvent;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub artwork_id: i64,
    pub like_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked_by_me: Option<bool>,
}

/// POST /api/likes/{artwork_id}
pub async fn like_artwork(
    Path(artwork_id): Path<i64>,
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<LikeEvent>> {
    info!("POST /api/likes/{} - user {}", artwork_id, ctx.user_id());
    let event = state.hub.publish_like(artwork_id, ctx.user_id()).await?;
    Ok(Json(event))
}

/// GET /api/likes/{artwork_id}
pub async fn get_likes(
    Path(artwork_id): Path<i64>,
    State(state): State<AppState>,
    ctx: Option<Ctx>,
) -> Result<Json<LikeStatus>> {
    let like_count = state.artworks.like_count(artwork_id).await?;
    let liked_by_me = match ctx {
        Some(ctx) => Some(state.artworks.has_liked(artwork_id, ctx.user_id()).await?),
        None => None,
    };

    Ok(Json(LikeStatus {
        artwork_id,
        like_count,
        liked_by_me,
    }))
}
