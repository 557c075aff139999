//! Value model: one raw field value of a page, stored under its namespaced
//! name.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::content::naming::SEP;

/// Value record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CmsValue {
    pub page_id: Uuid,

    /// Namespaced name (`section/part/position/leaf`).
    pub name: String,

    /// Field type name the value was saved with.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub type_name: String,

    /// Raw persisted string.
    pub value: String,
}

impl CmsValue {
    /// Every value of a page, ordered by name.
    pub async fn for_page<'e, E>(executor: E, page_id: Uuid) -> Result<Vec<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let values = sqlx::query_as::<_, CmsValue>(
            "SELECT page_id, name, type, value FROM cms_value WHERE page_id = ? ORDER BY name",
        )
        .bind(page_id)
        .fetch_all(executor)
        .await
        .context("failed to list page values")?;

        Ok(values)
    }

    /// Values named `prefix` or living under `prefix/`.
    pub async fn under<'e, E>(executor: E, page_id: Uuid, prefix: &str) -> Result<Vec<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let nested = format!("{prefix}{SEP}");
        // substr rather than LIKE: `_` and `%` are common in names.
        let values = sqlx::query_as::<_, CmsValue>(
            r#"
            SELECT page_id, name, type, value FROM cms_value
            WHERE page_id = ? AND (name = ? OR substr(name, 1, ?) = ?)
            ORDER BY name
            "#,
        )
        .bind(page_id)
        .bind(prefix)
        .bind(nested.chars().count() as i64)
        .bind(&nested)
        .fetch_all(executor)
        .await
        .context("failed to list values by prefix")?;

        Ok(values)
    }

    /// Insert or replace a value. The type is rewritten too, so a field
    /// whose type was redefined keeps its row.
    pub async fn upsert<'e, E>(
        executor: E,
        page_id: Uuid,
        name: &str,
        type_name: &str,
        value: &str,
    ) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO cms_value (page_id, name, type, value)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (page_id, name) DO UPDATE SET type = excluded.type, value = excluded.value
            "#,
        )
        .bind(page_id)
        .bind(name)
        .bind(type_name)
        .bind(value)
        .execute(executor)
        .await
        .context("failed to upsert value")?;

        Ok(())
    }

    /// Delete values named `prefix` or living under `prefix/`.
    pub async fn delete_under<'e, E>(executor: E, page_id: Uuid, prefix: &str) -> Result<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let nested = format!("{prefix}{SEP}");
        let result = sqlx::query(
            "DELETE FROM cms_value WHERE page_id = ? AND (name = ? OR substr(name, 1, ?) = ?)",
        )
        .bind(page_id)
        .bind(prefix)
        .bind(nested.chars().count() as i64)
        .bind(&nested)
        .execute(executor)
        .await
        .context("failed to delete values")?;

        Ok(result.rows_affected())
    }

    pub async fn delete_for_page<'e, E>(executor: E, page_id: Uuid) -> Result<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM cms_value WHERE page_id = ?")
            .bind(page_id)
            .execute(executor)
            .await
            .context("failed to delete page values")?;

        Ok(result.rows_affected())
    }

    /// Duplicate every value of `from` onto `to`.
    pub async fn copy<'e, E>(executor: E, from: Uuid, to: Uuid) -> Result<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO cms_value (page_id, name, type, value)
            SELECT ?, name, type, value FROM cms_value WHERE page_id = ?
            "#,
        )
        .bind(to)
        .bind(from)
        .execute(executor)
        .await
        .context("failed to copy values")?;

        Ok(result.rows_affected())
    }
}
