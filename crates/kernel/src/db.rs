//! Database connection pool management.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::config::{Config, is_memory_url};

/// Tables and indexes, created idempotently on connect.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cms_path (
    id BLOB PRIMARY KEY NOT NULL,
    path TEXT NOT NULL,
    locale TEXT NOT NULL DEFAULT '',
    UNIQUE (path, locale)
);

CREATE TABLE IF NOT EXISTS cms_page (
    id BLOB PRIMARY KEY NOT NULL,
    path_id BLOB NOT NULL REFERENCES cms_path(id),
    template TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'draft'
        CHECK (state IN ('draft', 'live', 'archived')),
    description TEXT NOT NULL DEFAULT '',
    updated INTEGER NOT NULL,
    meta_title TEXT NOT NULL DEFAULT '',
    meta_description TEXT NOT NULL DEFAULT '',
    meta_keywords TEXT NOT NULL DEFAULT '',
    search_image TEXT NOT NULL DEFAULT '',
    search_text TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_cms_page_path ON cms_page (path_id, state);

-- At most one draft per path.
CREATE UNIQUE INDEX IF NOT EXISTS idx_cms_page_one_draft
    ON cms_page (path_id) WHERE state = 'draft';

CREATE TABLE IF NOT EXISTS cms_value (
    page_id BLOB NOT NULL REFERENCES cms_page(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (page_id, name)
);

CREATE TABLE IF NOT EXISTS cms_rendered (
    page_id BLOB NOT NULL REFERENCES cms_page(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (page_id, name)
);

CREATE TABLE IF NOT EXISTS audit_log (
    id BLOB PRIMARY KEY NOT NULL,
    actor TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id BLOB NOT NULL,
    action TEXT NOT NULL,
    message TEXT NOT NULL DEFAULT '',
    created INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_log_entity ON audit_log (entity_type, entity_id);
"#;

/// Create a SQLite connection pool and bootstrap the schema.
pub async fn create_pool(config: &Config) -> Result<SqlitePool> {
    let memory = is_memory_url(&config.database_url);
    let mut options = SqliteConnectOptions::from_str(&config.database_url)
        .context("invalid DATABASE_URL")?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(if memory {
        1
    } else {
        config.database_max_connections
    });
    if memory {
        // Every connection to :memory: is its own database; keep the one alive.
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .context("failed to connect to SQLite")?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Create the schema if it does not exist yet.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("failed to create schema")?;
    debug!("database schema ready");
    Ok(())
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &SqlitePool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn memory_config() -> Config {
        Config::from_lookup(|key| (key == "DATABASE_URL").then(|| "sqlite::memory:".to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn bootstraps_schema_idempotently() {
        let pool = create_pool(&memory_config()).await.unwrap();
        migrate(&pool).await.unwrap();
        assert!(check_health(&pool).await);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        for table in ["audit_log", "cms_page", "cms_path", "cms_rendered", "cms_value"] {
            assert!(tables.iter().any(|t| t == table), "missing {table}");
        }
    }
}
