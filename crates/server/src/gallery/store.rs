//! Artwork persistence
//!
//! SQLite-backed artwork and like records. The hub only sees the
//! [`ArtworkStore`] trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use super::models::{Artwork, GalleryPage, NewArtwork};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artwork {0} not found")]
    NotFound(i64),

    #[error("User {user_id} does not own artwork {artwork_id}")]
    NotOwner { artwork_id: i64, user_id: i64 },

    #[error("User {user_id} already liked artwork {artwork_id}")]
    AlreadyLiked { artwork_id: i64, user_id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = core::result::Result<T, StoreError>;

/// Like persistence as seen by the notification hub.
#[async_trait]
pub trait ArtworkStore: Send + Sync + 'static {
    /// Record that `user_id` likes `artwork_id` and return the new count.
    async fn record_like(&self, artwork_id: i64, user_id: i64) -> Result<i64>;
}

pub const MAX_PER_PAGE: u32 = 100;

const ARTWORK_COLUMNS: &str = "id, owner_id, title, description, image_hash, like_count, created_at";

pub struct SqliteArtworkStore {
    pool: SqlitePool,
}

impl SqliteArtworkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, owner_id: i64, new: NewArtwork) -> Result<Artwork> {
        let created_at = Utc::now();
        let description = new
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let id = sqlx::query(
            "INSERT INTO artworks (owner_id, title, description, image_hash, like_count, created_at) VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(owner_id)
        .bind(new.title.trim())
        .bind(&description)
        .bind(&new.image_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!("[Gallery] Artwork {} created by user {}", id, owner_id);

        Ok(Artwork {
            id,
            owner_id,
            title: new.title.trim().to_string(),
            description,
            image_hash: new.image_hash,
            like_count: 0,
            created_at,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Artwork>> {
        let artwork: Option<Artwork> = sqlx::query_as(&format!(
            "SELECT {} FROM artworks WHERE id = ?",
            ARTWORK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(artwork)
    }

    /// Newest first. `page` is 1-based; both arguments are clamped.
    pub async fn list_page(&self, page: u32, per_page: u32) -> Result<GalleryPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let offset = i64::from(page - 1) * i64::from(per_page);

        let items: Vec<Artwork> = sqlx::query_as(&format!(
            "SELECT {} FROM artworks ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            ARTWORK_COLUMNS
        ))
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(GalleryPage {
            items,
            page,
            per_page,
            total: self.count().await?,
        })
    }

    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Artwork>> {
        let items: Vec<Artwork> = sqlx::query_as(&format!(
            "SELECT {} FROM artworks WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
            ARTWORK_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM artworks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Delete an artwork owned by `owner_id`, together with its likes.
    pub async fn delete(&self, owner_id: i64, id: i64) -> Result<Artwork> {
        let mut tx = self.pool.begin().await?;

        let artwork: Option<Artwork> = sqlx::query_as(&format!(
            "SELECT {} FROM artworks WHERE id = ?",
            ARTWORK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let artwork = artwork.ok_or(StoreError::NotFound(id))?;
        if artwork.owner_id != owner_id {
            return Err(StoreError::NotOwner {
                artwork_id: id,
                user_id: owner_id,
            });
        }

        sqlx::query("DELETE FROM likes WHERE artwork_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM artworks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("[Gallery] Artwork {} deleted by user {}", id, owner_id);
        Ok(artwork)
    }

    /// Whether any artwork still points at `image_hash`.
    pub async fn image_in_use(&self, image_hash: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM artworks WHERE image_hash = ? LIMIT 1")
            .bind(image_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn like_count(&self, artwork_id: i64) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT like_count FROM artworks WHERE id = ?")
            .bind(artwork_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(count,)| count).ok_or(StoreError::NotFound(artwork_id))
    }

    pub async fn has_liked(&self, artwork_id: i64, user_id: i64) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM likes WHERE artwork_id = ? AND user_id = ?")
                .bind(artwork_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ArtworkStore for SqliteArtworkStore {
    async fn record_like(&self, artwork_id: i64, user_id: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        // Write first so the transaction takes the write lock up front
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO likes (user_id, artwork_id, created_at) SELECT ?, id, ? FROM artworks WHERE id = ?",
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(artwork_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM artworks WHERE id = ?")
                .bind(artwork_id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::AlreadyLiked {
                    artwork_id,
                    user_id,
                },
                None => StoreError::NotFound(artwork_id),
            });
        }

        let (like_count,): (i64,) = sqlx::query_as(
            "UPDATE artworks SET like_count = like_count + 1 WHERE id = ? RETURNING like_count",
        )
        .bind(artwork_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "[Gallery] User {} liked artwork {} (count {})",
            user_id, artwork_id, like_count
        );
        Ok(like_count)
    }
}
