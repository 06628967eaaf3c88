use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{StoredWorkflow, WorkflowSummary};

/// Storage trait for workflows and their compiled pipelines.
///
/// `put` replaces the definition and the artifact together, so a reader
/// never sees a pipeline compiled from a different definition.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
  /// Get a workflow by ID.
  async fn get(&self, workflow_id: &str) -> Result<Option<StoredWorkflow>, StoreError>;

  /// Insert or replace a workflow.
  async fn put(&self, workflow: &StoredWorkflow) -> Result<(), StoreError>;

  /// List all workflows, ordered by id.
  async fn list(&self) -> Result<Vec<WorkflowSummary>, StoreError>;

  /// Delete a workflow and its artifact. Returns whether it existed.
  async fn delete(&self, workflow_id: &str) -> Result<bool, StoreError>;
}
