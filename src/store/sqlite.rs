// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use sqlx::{Row, sqlite::SqlitePool};
use std::path::Path;
use tracing::{error, info};

use crate::store::models::{Refset, VersionStatus, WorkflowStatus};
use crate::store::traits::RefsetStore;

pub struct SqliteRefsetStore {
    pool: SqlitePool,
}

impl SqliteRefsetStore {
    pub async fn new(db_path: &Path) -> anyhow::Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&db_url).await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS refsets (
                refset_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                branch_path TEXT NOT NULL,
                member_count INTEGER NOT NULL DEFAULT 0,
                version_status TEXT NOT NULL,
                workflow_status TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Initialized SQLite refset store schema");
        Ok(())
    }

    fn refset_from_row(&self, row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Refset> {
        use chrono::DateTime;

        Ok(Refset {
            refset_id: row.get::<String, _>("refset_id"),
            name: row.get::<String, _>("name"),
            branch_path: row.get::<String, _>("branch_path"),
            member_count: row.get::<i64, _>("member_count"),
            version_status: VersionStatus::parse(&row.get::<String, _>("version_status")),
            workflow_status: WorkflowStatus::parse(&row.get::<String, _>("workflow_status")),
            modified_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("modified_at"))?
                .with_timezone(&chrono::Utc),
        })
    }
}

#[async_trait]
impl RefsetStore for SqliteRefsetStore {
    async fn add(&self, refset: Refset) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refsets (refset_id, name, branch_path, member_count, version_status, workflow_status, modified_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&refset.refset_id)
        .bind(&refset.name)
        .bind(&refset.branch_path)
        .bind(refset.member_count)
        .bind(refset.version_status.as_str())
        .bind(refset.workflow_status.as_str())
        .bind(refset.modified_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!(refset_id = %refset.refset_id, "Added reference set to store");
        Ok(())
    }

    async fn get(&self, refset_id: &str) -> anyhow::Result<Option<Refset>> {
        let row = sqlx::query("SELECT * FROM refsets WHERE refset_id = ?1")
            .bind(refset_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.refset_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<Refset>> {
        let rows = sqlx::query("SELECT * FROM refsets ORDER BY refset_id")
            .fetch_all(&self.pool)
            .await?;

        let mut refsets = Vec::new();
        for row in rows {
            match self.refset_from_row(&row) {
                Ok(refset) => refsets.push(refset),
                Err(e) => {
                    error!(error = %e, "Failed to parse reference set from database");
                }
            }
        }

        Ok(refsets)
    }

    async fn update(&self, refset: Refset) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE refsets
            SET name = ?2, branch_path = ?3, member_count = ?4, version_status = ?5, workflow_status = ?6, modified_at = ?7
            WHERE refset_id = ?1
            "#,
        )
        .bind(&refset.refset_id)
        .bind(&refset.name)
        .bind(&refset.branch_path)
        .bind(refset.member_count)
        .bind(refset.version_status.as_str())
        .bind(refset.workflow_status.as_str())
        .bind(refset.modified_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!(refset_id = %refset.refset_id, member_count = refset.member_count, "Updated reference set in store");
        Ok(())
    }

    async fn remove(&self, refset_id: &str) -> anyhow::Result<()> {
        let result = sqlx::query("DELETE FROM refsets WHERE refset_id = ?1")
            .bind(refset_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!(refset_id = %refset_id, "Removed reference set from store");
        }

        Ok(())
    }
}
