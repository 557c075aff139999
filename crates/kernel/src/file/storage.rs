//! File storage backends.
//!
//! Image values persist a storage key (a relative path such as
//! `cms/image/2026/10/16/0192ab34_photo.png`), never the bytes.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File storage backend trait.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write data under the given key, replacing any existing file.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read data stored under the given key.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete a file from storage.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get the public URL for a file.
    fn public_url(&self, key: &str) -> String;
}

/// Reject absolute keys and directory traversal.
pub fn validate_key(key: &str) -> Result<&Path> {
    let path = Path::new(key);
    if key.is_empty() {
        bail!("empty storage key");
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!("storage key must be a relative path without `..`: {key}"),
        }
    }
    Ok(path)
}

fn join_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Local filesystem storage.
pub struct LocalFileStorage {
    /// Base path for file storage.
    base_path: PathBuf,
    /// Base URL for public file access.
    base_url: String,
}

impl LocalFileStorage {
    /// Create a new local file storage.
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        Ok(self.base_path.join(validate_key(key)?))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::File::create(&path)
            .await
            .context("failed to create file")?;
        file.write_all(data).await.context("failed to write file")?;
        file.flush().await.context("failed to flush file")?;

        debug!(key = %key, path = ?path, size = data.len(), "file written");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        let data = fs::read(&path)
            .await
            .with_context(|| format!("failed to read file {key}"))?;
        debug!(key = %key, size = data.len(), "file read");
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .context("failed to delete file")?;
            debug!(key = %key, "file deleted");
        } else {
            warn!(key = %key, "file not found for deletion");
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Process-local storage, used for previews and tests.
pub struct MemoryFileStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
    base_url: String,
}

impl MemoryFileStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            base_url: base_url.into(),
        }
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.files.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        self.files
            .read()
            .get(key)
            .cloned()
            .with_context(|| format!("failed to read file {key}"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.files.write().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.files.read().contains_key(key))
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}

impl std::fmt::Debug for MemoryFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFileStorage")
            .field("files", &self.len())
            .field("base_url", &self.base_url)
            .finish()
    }
}
