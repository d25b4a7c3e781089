//! Gallery server configuration

use anyhow::Context;
use gallery_common::DataLayout;
use gallery_images::ImageStore;
use std::sync::Arc;
use tracing::info;

use crate::core::auth::AuthManager;
use crate::core::db;
use crate::gallery::store::SqliteArtworkStore;
use crate::realtime::hub::{HubConfig, NotificationHub};

/// Configuration for the gallery server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen port
    pub port: u16,
    /// Debug mode: verbose logs, permissive CORS
    pub debug: bool,
    /// Where the database and images live
    pub layout: DataLayout,
    /// Max simultaneous real-time connections (None = unbounded)
    pub max_connections: Option<usize>,
    /// Per-connection event queue length
    pub send_buffer: usize,
    /// WebSocket ping interval in seconds
    pub heartbeat_secs: u64,
    /// Close sockets silent for this long
    pub idle_timeout_secs: u64,
    /// Max image upload size in MB
    pub max_image_size_mb: usize,
    /// Session lifetime in days
    pub session_days: i64,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: std::env::var("GALLERY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            debug: false,
            layout: DataLayout::resolve(),
            max_connections: std::env::var("GALLERY_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok()),
            send_buffer: 64,
            heartbeat_secs: 30,
            idle_timeout_secs: 300,
            max_image_size_mb: 10,
            session_days: 30,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl ServerConfig {
    /// Create config with custom base directory
    pub fn with_base_dir(base_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            layout: DataLayout::new(base_dir),
            ..Self::default()
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_size_mb * 1024 * 1024
    }

    /// Ensure all directories exist
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        self.layout.init_structure()?;
        Ok(())
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub auth: Arc<AuthManager>,
    pub artworks: Arc<SqliteArtworkStore>,
    pub images: Arc<ImageStore>,
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// Open every store. Any failure here aborts startup.
    pub async fn init(config: ServerConfig) -> anyhow::Result<Self> {
        config.ensure_dirs()?;

        let pool = db::open(&config.layout.db_path()).await?;

        let auth = Arc::new(AuthManager::new(
            pool.clone(),
            config.bcrypt_cost,
            config.session_days,
        ));
        let purged = auth
            .purge_expired()
            .await
            .context("Failed to purge expired sessions")?;
        info!("Auth Manager initialized ({} stale sessions purged)", purged);

        let artworks = Arc::new(SqliteArtworkStore::new(pool));
        info!(
            "Artwork store initialized with {} artworks",
            artworks.count().await.context("Artwork store unreachable")?
        );

        let images = Arc::new(
            ImageStore::new(config.layout.images_dir(), config.layout.image_meta_path())
                .await
                .context("Failed to initialize image store")?,
        );

        let hub = Arc::new(NotificationHub::new(
            HubConfig {
                capacity: config.max_connections,
                send_buffer: config.send_buffer,
            },
            artworks.clone(),
        ));

        Ok(Self {
            config,
            auth,
            artworks,
            images,
            hub,
        })
    }
}
