//! Images API
//!
//! Uploads land in the content-addressed image store; artworks refer to
//! them by hash.

use crate::core::{AppState, Ctx, Error, Result};
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Json,
};
use bytes::Bytes;
use gallery_images::ImageMeta;
use tracing::{error, info};

/// POST /api/images
pub async fn upload_image(
    State(state): State<AppState>,
    ctx: Ctx,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImageMeta>)> {
    info!("POST /api/images - user {}", ctx.user_id());

    let limit = state.config.max_image_bytes();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit))?;

        upload = Some((filename, content_type, data));
    }

    let (filename, content_type, data) =
        upload.ok_or_else(|| Error::BadRequest("Missing `file` field".to_string()))?;

    if !content_type.starts_with("image/") {
        return Err(Error::BadRequest(format!(
            "Unsupported content type {}",
            content_type
        )));
    }
    if data.is_empty() {
        return Err(Error::BadRequest("Empty upload".to_string()));
    }
    if data.len() > limit {
        return Err(Error::PayloadTooLarge { limit_bytes: limit });
    }

    let meta = state.images.put(data, &content_type, &filename).await?;
    Ok((StatusCode::CREATED, Json(meta)))
}

/// Only a tripped body limit is a 413; anything else is a bad body.
fn multipart_error(err: MultipartError, limit: usize) -> Error {
    error!("Failed to read multipart body: {}", err);
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit_bytes: limit }
    } else {
        Error::BadRequest(format!("Malformed multipart body: {}", err))
    }
}

/// GET /api/images/{hash}
pub async fn get_image(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> Result<(HeaderMap, Bytes)> {
    let (data, meta) = state
        .images
        .get(&hash)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Image {} not found", hash)))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    // Content addressed: the bytes behind a hash never change
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok((headers, data))
}
