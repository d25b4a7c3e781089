//! Centralized directory structure management for the gallery server
//!
//! Directory layout:
//! ```text
//! gallery_data/
//! ├── local/           # SQLite database (users, sessions, artworks, likes)
//! └── images/          # Uploaded image files (content addressed)
//!     └── meta.sqlite  # Image metadata
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable that overrides the data root.
pub const ROOT_ENV: &str = "GALLERY_ROOT";

/// Fallback data root, relative to the working directory.
pub const DEFAULT_ROOT: &str = "gallery_data";

#[derive(Serialize, Deserialize, Debug)]
struct GalleryConfig {
    gallery_root: Option<PathBuf>,
}

/// Get the global configuration path
fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gallery").join("config.json"))
}

/// Load the persistent root from config file
pub fn load_persistent_root() -> Option<PathBuf> {
    let path = get_config_path()?;
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<GalleryConfig>(&content) {
            Ok(config) => config.gallery_root,
            Err(e) => {
                warn!("Failed to parse config file at {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read config file at {:?}: {}", path, e);
            None
        }
    }
}

/// Save a path as the persistent gallery root
pub fn save_persistent_root(root: PathBuf) -> anyhow::Result<()> {
    let path =
        get_config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config dir"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = GalleryConfig {
        gallery_root: Some(root),
    };
    let json = serde_json::to_string_pretty(&config)?;
    fs::write(path, json)?;
    Ok(())
}

/// Get the data root from environment, persistent config, or default
pub fn gallery_root() -> PathBuf {
    if let Ok(val) = std::env::var(ROOT_ENV) {
        return PathBuf::from(val);
    }

    if let Some(root) = load_persistent_root() {
        return root;
    }

    PathBuf::from(DEFAULT_ROOT)
}

/// Paths derived from one data root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at [`gallery_root`].
    pub fn resolve() -> Self {
        Self::new(gallery_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local data directory (SQLite)
    pub fn local_dir(&self) -> PathBuf {
        self.root.join("local")
    }

    /// Application database file
    pub fn db_path(&self) -> PathBuf {
        self.local_dir().join("gallery.sqlite")
    }

    /// Uploaded image files
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Image metadata database
    pub fn image_meta_path(&self) -> PathBuf {
        self.images_dir().join("meta.sqlite")
    }

    /// Create every directory of the layout.
    ///
    /// Returns the canonical root path.
    pub fn init_structure(&self) -> anyhow::Result<PathBuf> {
        ensure_dir(&self.root)?;
        ensure_dir(&self.local_dir())?;
        ensure_dir(&self.images_dir())?;

        let canonical = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        info!("Gallery directory structure initialized at: {:?}", canonical);
        Ok(canonical)
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::resolve()
    }
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}
