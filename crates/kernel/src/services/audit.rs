//! Audit logging service.
//!
//! Append-only record of who did what to which page.

use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// Kind of change recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AuditAction {
    Addition,
    Change,
    Deletion,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditAction::Addition => "addition",
            AuditAction::Change => "change",
            AuditAction::Deletion => "deletion",
        })
    }
}

/// Audit log entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub message: String,
    pub created: i64,
}

/// Audit logging service.
#[derive(Clone)]
pub struct AuditService {
    pool: SqlitePool,
}

impl AuditService {
    /// Create a new audit service.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Log an auditable action.
    pub async fn log(
        &self,
        actor: &str,
        entity_type: &str,
        entity_id: Uuid,
        action: AuditAction,
        message: &str,
    ) -> Result<()> {
        Self::log_with(&self.pool, actor, entity_type, entity_id, action, message).await
    }

    /// Log inside an open transaction.
    pub async fn log_with<'e, E>(
        executor: E,
        actor: &str,
        entity_type: &str,
        entity_id: Uuid,
        action: AuditAction,
        message: &str,
    ) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, actor, entity_type, entity_id, action, message, created)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(actor)
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(message)
        .bind(chrono::Utc::now().timestamp())
        .execute(executor)
        .await
        .context("failed to write audit log")?;

        debug!(
            action = %action,
            entity_type = %entity_type,
            entity_id = %entity_id,
            "audit log entry created"
        );

        Ok(())
    }

    /// Entries for one entity, newest first.
    pub async fn history(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, actor, entity_type, entity_id, action, message, created
            FROM audit_log
            WHERE entity_type = ? AND entity_id = ?
            ORDER BY created DESC, id DESC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to load audit history")?;

        Ok(entries)
    }
}

impl std::fmt::Debug for AuditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditService").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;

    #[tokio::test]
    async fn history_is_newest_first_and_scoped() {
        let config =
            Config::from_lookup(|key| (key == "DATABASE_URL").then(|| "sqlite::memory:".into()))
                .unwrap();
        let audit = AuditService::new(db::create_pool(&config).await.unwrap());
        let page = Uuid::now_v7();

        audit.log("admin", "page", page, AuditAction::Addition, "created").await.unwrap();
        audit.log("admin", "page", page, AuditAction::Change, "published").await.unwrap();
        audit
            .log("admin", "page", Uuid::now_v7(), AuditAction::Deletion, "other")
            .await
            .unwrap();

        let history = audit.history("page", page).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "published");
        assert_eq!(history[1].action, AuditAction::Addition);
    }
}
