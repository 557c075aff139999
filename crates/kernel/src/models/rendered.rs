//! Rendered model: cached HTML per page section.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqliteExecutor;
use uuid::Uuid;

/// Rendered section record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Rendered {
    pub page_id: Uuid,

    /// Section name.
    pub name: String,

    /// Rendered HTML.
    pub value: String,
}

impl Rendered {
    pub async fn for_page<'e, E>(executor: E, page_id: Uuid) -> Result<Vec<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, Rendered>(
            "SELECT page_id, name, value FROM cms_rendered WHERE page_id = ? ORDER BY name",
        )
        .bind(page_id)
        .fetch_all(executor)
        .await
        .context("failed to list rendered sections")?;

        Ok(rows)
    }

    pub async fn upsert<'e, E>(executor: E, page_id: Uuid, name: &str, html: &str) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO cms_rendered (page_id, name, value)
            VALUES (?, ?, ?)
            ON CONFLICT (page_id, name) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(page_id)
        .bind(name)
        .bind(html)
        .execute(executor)
        .await
        .context("failed to store rendered section")?;

        Ok(())
    }

    pub async fn delete_for_page<'e, E>(executor: E, page_id: Uuid) -> Result<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM cms_rendered WHERE page_id = ?")
            .bind(page_id)
            .execute(executor)
            .await
            .context("failed to delete rendered sections")?;

        Ok(result.rows_affected())
    }
}
