use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;
use crate::store::WorkflowStore;
use crate::types::{StoredWorkflow, WorkflowSummary};

const CREATE_WORKFLOWS: &str = r#"
  CREATE TABLE IF NOT EXISTS workflows (
    workflow_id TEXT PRIMARY KEY NOT NULL,
    definition TEXT NOT NULL,
    bindings TEXT NOT NULL,
    pipeline TEXT,
    compile_errors TEXT NOT NULL,
    saved_at TEXT NOT NULL
  )
"#;

/// SQLite-based store implementation.
pub struct SqliteWorkflowStore {
  pool: SqlitePool,
}

impl SqliteWorkflowStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Create the workflow table if it does not exist.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::query(CREATE_WORKFLOWS).execute(&self.pool).await?;
    Ok(())
  }

  fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<StoredWorkflow, StoreError> {
    let definition: String = row.try_get("definition")?;
    let bindings: String = row.try_get("bindings")?;
    let pipeline: Option<String> = row.try_get("pipeline")?;
    let compile_errors: String = row.try_get("compile_errors")?;
    let saved_at: DateTime<Utc> = row.try_get("saved_at")?;

    Ok(StoredWorkflow {
      definition: serde_json::from_str(&definition)?,
      bindings: serde_json::from_str(&bindings)?,
      pipeline: pipeline.as_deref().map(serde_json::from_str).transpose()?,
      compile_errors: serde_json::from_str(&compile_errors)?,
      saved_at,
    })
  }
}

#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
  async fn get(&self, workflow_id: &str) -> Result<Option<StoredWorkflow>, StoreError> {
    let row = sqlx::query(
      r#"
      SELECT definition, bindings, pipeline, compile_errors, saved_at
      FROM workflows
      WHERE workflow_id = ?
      "#,
    )
    .bind(workflow_id)
    .fetch_optional(&self.pool)
    .await?;

    row.as_ref().map(Self::decode).transpose()
  }

  async fn put(&self, workflow: &StoredWorkflow) -> Result<(), StoreError> {
    let pipeline = workflow
      .pipeline
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;

    sqlx::query(
      r#"
      INSERT INTO workflows (workflow_id, definition, bindings, pipeline, compile_errors, saved_at)
      VALUES (?, ?, ?, ?, ?, ?)
      ON CONFLICT (workflow_id) DO UPDATE SET
        definition = excluded.definition,
        bindings = excluded.bindings,
        pipeline = excluded.pipeline,
        compile_errors = excluded.compile_errors,
        saved_at = excluded.saved_at
      "#,
    )
    .bind(workflow.id())
    .bind(serde_json::to_string(&workflow.definition)?)
    .bind(serde_json::to_string(&workflow.bindings)?)
    .bind(pipeline)
    .bind(serde_json::to_string(&workflow.compile_errors)?)
    .bind(workflow.saved_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list(&self) -> Result<Vec<WorkflowSummary>, StoreError> {
    let rows = sqlx::query(
      r#"
      SELECT definition, bindings, pipeline, compile_errors, saved_at
      FROM workflows
      ORDER BY workflow_id
      "#,
    )
    .fetch_all(&self.pool)
    .await?;

    rows
      .iter()
      .map(|row| Self::decode(row).map(|w| w.summary()))
      .collect()
  }

  async fn delete(&self, workflow_id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM workflows WHERE workflow_id = ?")
      .bind(workflow_id)
      .execute(&self.pool)
      .await?;

    Ok(result.rows_affected() > 0)
  }
}
