use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, ImageError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] rusqlite::Error),

    #[error("Invalid image hash: {0}")]
    InvalidHash(String),

    #[error("Checksum mismatch for image {hash}: got {actual}")]
    ChecksumMismatch { hash: String, actual: String },
}

/// Stored image description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub hash: String,
    pub content_type: String,
    pub filename: String,
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct ImageStore {
    dir: PathBuf,
    meta_conn: Arc<Mutex<Connection>>,
}

impl ImageStore {
    pub async fn new(dir: PathBuf, meta_db_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        if let Some(parent) = meta_db_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(&meta_db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS images (
                hash TEXT PRIMARY KEY,
                content_type TEXT NOT NULL,
                filename TEXT NOT NULL,
                size INTEGER NOT NULL
            )",
            [],
        )?;

        info!("[Images] Store opened at {:?}", dir);

        Ok(Self {
            dir,
            meta_conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Store an image and return its metadata.
    ///
    /// Identical bytes are stored once; a second upload returns the
    /// metadata recorded by the first.
    pub async fn put(&self, data: Bytes, content_type: &str, filename: &str) -> Result<ImageMeta> {
        let hash = content_hash(&data);

        if let Some(existing) = self.get_meta(&hash).await? {
            debug!("[Images] Dedup hit for {}", hash);
            return Ok(existing);
        }

        let meta = ImageMeta {
            hash: hash.clone(),
            content_type: content_type.to_string(),
            filename: filename.to_string(),
            size: data.len() as u64,
        };

        atomic_write(&self.file_path(&hash), &data, &self.dir.join("tmp")).await?;

        {
            let conn = self.meta_conn.lock().await;
            conn.execute(
                "INSERT OR REPLACE INTO images (hash, content_type, filename, size) VALUES (?1, ?2, ?3, ?4)",
                params![meta.hash, meta.content_type, meta.filename, meta.size as i64],
            )?;
        }

        info!("[Images] Stored {} ({} bytes)", hash, meta.size);
        Ok(meta)
    }

    /// Read an image, verifying its bytes against the hash.
    pub async fn get(&self, hash: &str) -> Result<Option<(Bytes, ImageMeta)>> {
        let Some(meta) = self.get_meta(hash).await? else {
            return Ok(None);
        };

        let path = self.file_path(hash);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let data = fs::read(&path).await?;
        let actual = content_hash(&data);
        if actual != hash {
            return Err(ImageError::ChecksumMismatch {
                hash: hash.to_string(),
                actual,
            });
        }

        Ok(Some((Bytes::from(data), meta)))
    }

    pub async fn get_meta(&self, hash: &str) -> Result<Option<ImageMeta>> {
        if !is_valid_hash(hash) {
            return Err(ImageError::InvalidHash(hash.to_string()));
        }

        let conn = self.meta_conn.lock().await;
        let meta = conn
            .query_row(
                "SELECT hash, content_type, filename, size FROM images WHERE hash = ?1",
                params![hash],
                |row| {
                    Ok(ImageMeta {
                        hash: row.get(0)?,
                        content_type: row.get(1)?,
                        filename: row.get(2)?,
                        size: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    pub async fn contains(&self, hash: &str) -> Result<bool> {
        Ok(self.get_meta(hash).await?.is_some())
    }

    pub async fn delete(&self, hash: &str) -> Result<()> {
        if !is_valid_hash(hash) {
            return Err(ImageError::InvalidHash(hash.to_string()));
        }

        {
            let conn = self.meta_conn.lock().await;
            conn.execute("DELETE FROM images WHERE hash = ?1", params![hash])?;
        }

        let path = self.file_path(hash);
        if fs::try_exists(&path).await? {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }

    /// Files are sharded by the first two hex digits of the hash.
    fn file_path(&self, hash: &str) -> PathBuf {
        self.dir.join(&hash[..2]).join(hash)
    }
}

/// Lowercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// 64 lowercase hex digits.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Write `data` to a temp file in `temp_folder`, then rename over `dest`.
pub async fn atomic_write(dest: &Path, data: &[u8], temp_folder: &Path) -> Result<()> {
    fs::create_dir_all(temp_folder).await?;

    let temp_path = temp_folder.join(format!("tmp_{}", uuid::Uuid::new_v4()));
    fs::write(&temp_path, data).await?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    if let Err(e) = fs::rename(&temp_path, dest).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}
