/// Workflow persistence layer
///
/// `WorkflowStore` is the storage seam used by the HTTP layer. The SQLite
/// backend lives here; the in-process backend lives in `memory.rs`.
/// Workflows are stored as JSON for flexibility while keeping indexed
/// lookup fields for ordering.

use crate::workflow::types::Workflow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::str::FromStr;

/// One page of stored workflows
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowPage {
    pub workflows: Vec<Workflow>,
    /// Number of stored workflows, ignoring pagination
    pub total: usize,
}

/// Keyed CRUD over workflow definitions
///
/// Every stored workflow carries an `id`; `put` rejects workflows without one.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Workflow>>;

    /// Insert or replace by id
    async fn put(&self, workflow: &Workflow) -> Result<()>;

    /// Returns whether a workflow was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Page through workflows ordered by creation time, then id
    async fn list(&self, limit: usize, offset: usize) -> Result<WorkflowPage>;

    /// Drop every stored workflow
    async fn clear(&self) -> Result<()>;
}

/// Extract the storage key of a workflow
pub(crate) fn workflow_key(workflow: &Workflow) -> Result<&str> {
    workflow
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Workflow '{}' has no id", workflow.name))
}

/// SQLite-based workflow storage
#[derive(Debug, Clone)]
pub struct SqliteWorkflowStore {
    /// SQLite connection pool for workflow database
    pool: SqlitePool,
}

impl SqliteWorkflowStore {
    /// Create new storage instance over an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url`, creating the database file and schema if missing
    pub async fn connect(database_url: &str) -> Result<Self> {
        tracing::info!("🗄️ Opening workflow database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Private in-memory database, used by tests
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize the workflow storage schema
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                definition JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_workflows_created
            ON workflows(created_at, id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
    async fn get(&self, id: &str) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let definition_json: String = row.get("definition");
                let workflow: Workflow = serde_json::from_str(&definition_json)?;
                Ok(Some(workflow))
            }
            None => Ok(None),
        }
    }

    /// Uses UPSERT so create and update share one statement. The original
    /// `created_at` survives updates.
    async fn put(&self, workflow: &Workflow) -> Result<()> {
        let id = workflow_key(workflow)?;
        let definition_json = serde_json::to_string(workflow)?;
        let now = chrono::Utc::now();
        let created_at = workflow
            .created_at
            .unwrap_or(now)
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        let updated_at = workflow
            .updated_at
            .unwrap_or(now)
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, definition, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(&workflow.name)
        .bind(&definition_json)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!("💾 Stored workflow {} ({})", id, workflow.name);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<WorkflowPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflows")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT definition FROM workflows ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            let definition_json: String = row.get("definition");
            workflows.push(serde_json::from_str(&definition_json)?);
        }

        Ok(WorkflowPage {
            workflows,
            total: usize::try_from(total).unwrap_or_default(),
        })
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM workflows").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn workflow(id: &str, name: &str, age_secs: i64) -> Workflow {
        let created = Utc::now() - Duration::seconds(age_secs);
        Workflow {
            id: Some(id.to_string()),
            name: name.to_string(),
            description: None,
            nodes: vec![],
            edges: vec![],
            created_at: Some(created),
            updated_at: Some(created),
        }
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = SqliteWorkflowStore::open_in_memory().await.unwrap();

        store.put(&workflow("wf-1", "First", 0)).await.unwrap();
        let loaded = store.get("wf-1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "First");

        assert!(store.delete("wf-1").await.unwrap());
        assert!(!store.delete("wf-1").await.unwrap());
        assert!(store.get("wf-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_existing_definition() {
        let store = SqliteWorkflowStore::open_in_memory().await.unwrap();

        store.put(&workflow("wf-1", "Before", 0)).await.unwrap();
        store.put(&workflow("wf-1", "After", 0)).await.unwrap();

        let page = store.list(10, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.workflows[0].name, "After");
    }

    #[tokio::test]
    async fn list_is_ordered_and_paginated() {
        let store = SqliteWorkflowStore::open_in_memory().await.unwrap();
        store.put(&workflow("c", "newest", 1)).await.unwrap();
        store.put(&workflow("a", "oldest", 30)).await.unwrap();
        store.put(&workflow("b", "middle", 20)).await.unwrap();

        let page = store.list(2, 1).await.unwrap();
        assert_eq!(page.total, 3);
        let names: Vec<_> = page.workflows.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["middle", "newest"]);

        store.clear().await.unwrap();
        assert_eq!(store.list(10, 0).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn put_without_id_is_rejected() {
        let store = SqliteWorkflowStore::open_in_memory().await.unwrap();
        let mut wf = workflow("x", "No id", 0);
        wf.id = None;

        assert!(store.put(&wf).await.is_err());
    }
}
