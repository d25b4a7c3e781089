use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::auth::User;

/// Artwork record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Artwork {
    pub id: i64,
    /// Weak reference: the owner row may no longer exist
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_hash: String,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewArtwork {
    pub title: String,
    pub description: Option<String>,
    pub image_hash: String,
}

/// Public owner info attached to artwork responses
#[derive(Debug, Clone, Serialize)]
pub struct OwnerInfo {
    pub id: i64,
    pub username: String,
}

impl From<User> for OwnerInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtworkView {
    #[serde(flatten)]
    pub artwork: Artwork,
    pub owner: Option<OwnerInfo>,
    pub liked_by_me: Option<bool>,
    pub image_url: String,
}

impl ArtworkView {
    pub fn new(artwork: Artwork, owner: Option<OwnerInfo>, liked_by_me: Option<bool>) -> Self {
        let image_url = format!("/api/images/{}", artwork.image_hash);
        Self {
            artwork,
            owner,
            liked_by_me,
            image_url,
        }
    }
}

/// One page of the gallery
#[derive(Debug, Clone, Serialize)]
pub struct GalleryPage {
    pub items: Vec<Artwork>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}
