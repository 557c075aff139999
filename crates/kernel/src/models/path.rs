//! Path model: the URL (plus optional locale) pages are addressed by.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::content::naming::normalize_path;

/// Path record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CmsPath {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Normalized URL, always wrapped in `/`.
    pub path: String,

    /// Language code, empty when the path is not localized.
    pub locale: String,
}

impl CmsPath {
    /// Find the path for `(url, locale)` or create it. The URL is normalized
    /// first.
    pub async fn get_or_create<'e, E>(executor: E, url: &str, locale: &str) -> Result<Self>
    where
        E: SqliteExecutor<'e>,
    {
        let path = normalize_path(url);
        // DO UPDATE (not DO NOTHING) so RETURNING also yields existing rows.
        let row = sqlx::query_as::<_, CmsPath>(
            r#"
            INSERT INTO cms_path (id, path, locale)
            VALUES (?, ?, ?)
            ON CONFLICT (path, locale) DO UPDATE SET path = excluded.path
            RETURNING id, path, locale
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&path)
        .bind(locale)
        .fetch_one(executor)
        .await
        .context("failed to get or create path")?;

        Ok(row)
    }

    /// Find a path by URL and locale.
    pub async fn find<'e, E>(executor: E, url: &str, locale: &str) -> Result<Option<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query_as::<_, CmsPath>(
            "SELECT id, path, locale FROM cms_path WHERE path = ? AND locale = ?",
        )
        .bind(normalize_path(url))
        .bind(locale)
        .fetch_optional(executor)
        .await
        .context("failed to fetch path")?;

        Ok(row)
    }
}
