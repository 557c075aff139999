//! File handling for image values.
//!
//! Uploads are sniffed, given a unique key under the configured upload
//! directory pattern, and written to a [`FileStorage`] backend. XML
//! interchange moves the bytes as base64.

mod storage;

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

pub use storage::{FileStorage, LocalFileStorage, MemoryFileStorage, validate_key};

use crate::form::UploadedFile;

/// Keep only safe filename characters.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(200)
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// A fresh key for `file_name` under `upload_to`, which may contain
/// strftime placeholders (`cms/image/%Y/%m/%d`).
pub fn generate_key(upload_to: &str, file_name: &str) -> Result<String> {
    let mut dir = String::new();
    write!(dir, "{}", chrono::Utc::now().format(upload_to))
        .map_err(|_| anyhow!("invalid upload directory pattern: {upload_to}"))?;
    let unique_id = uuid::Uuid::now_v7().simple().to_string();
    let dir = dir.trim_matches('/');
    let name = format!("{}_{}", &unique_id[24..], sanitize_filename(file_name));
    Ok(if dir.is_empty() {
        name
    } else {
        format!("{dir}/{name}")
    })
}

/// Whether the bytes look like an image.
pub fn is_image(data: &[u8]) -> bool {
    infer::is_image(data)
}

/// Store a new upload and return its key.
pub async fn store_upload(
    storage: &dyn FileStorage,
    upload_to: &str,
    upload: &UploadedFile,
) -> Result<String> {
    let key = generate_key(upload_to, &upload.file_name)?;
    storage.write(&key, &upload.data).await?;
    info!(key = %key, size = upload.data.len(), "stored upload");
    Ok(key)
}

/// Store imported bytes, preferring the key they were exported under.
///
/// An identical file already at that key is reused; a different one gets a
/// fresh key so nothing is overwritten.
pub async fn store_imported(
    storage: &dyn FileStorage,
    upload_to: &str,
    preferred_key: &str,
    data: &[u8],
) -> Result<String> {
    if validate_key(preferred_key).is_ok() {
        if !storage.exists(preferred_key).await? {
            storage.write(preferred_key, data).await?;
            debug!(key = %preferred_key, "imported file stored under original key");
            return Ok(preferred_key.to_string());
        }
        if storage.read(preferred_key).await? == data {
            debug!(key = %preferred_key, "imported file already present");
            return Ok(preferred_key.to_string());
        }
    }
    let key = generate_key(upload_to, preferred_key)?;
    storage.write(&key, data).await?;
    debug!(key = %key, "imported file stored under new key");
    Ok(key)
}

pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).context("invalid base64 payload")
}

/// Last segment of a storage key.
pub fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_filename(".."), "file");
    }

    #[test]
    fn generated_keys_follow_pattern() {
        let key = generate_key("cms/image/%Y", "Photo 1.png").unwrap();
        let year = chrono::Utc::now().format("%Y").to_string();
        assert!(key.starts_with(&format!("cms/image/{year}/")));
        assert!(key.ends_with("_Photo_1.png"));
        assert!(validate_key(&key).is_ok());
        assert_ne!(key, generate_key("cms/image/%Y", "Photo 1.png").unwrap());
    }

    #[test]
    fn base64_round_trip_ignores_whitespace() {
        let encoded = encode_base64(b"hello world");
        let wrapped = format!("{}\n{}", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_base64(&wrapped).unwrap(), b"hello world");
        assert!(decode_base64("***").is_err());
    }

    #[test]
    fn file_names_from_keys() {
        assert_eq!(file_name_of("cms/image/a.png"), "a.png");
        assert_eq!(file_name_of("a.png"), "a.png");
    }

    #[tokio::test]
    async fn imports_reuse_identical_files() {
        let storage = MemoryFileStorage::new("/files");
        let first = store_imported(&storage, "cms", "cms/x/a.png", b"one").await.unwrap();
        assert_eq!(first, "cms/x/a.png");
        let again = store_imported(&storage, "cms", "cms/x/a.png", b"one").await.unwrap();
        assert_eq!(again, "cms/x/a.png");
        let other = store_imported(&storage, "cms", "cms/x/a.png", b"two").await.unwrap();
        assert_ne!(other, "cms/x/a.png");
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn uploads_get_fresh_keys() {
        let storage = MemoryFileStorage::new("/files");
        let upload = UploadedFile::new("a.png", vec![1, 2, 3]);
        let key = store_upload(&storage, "cms/image", &upload).await.unwrap();
        assert!(key.starts_with("cms/image/"));
        assert_eq!(storage.read(&key).await.unwrap(), vec![1, 2, 3]);
    }
}
