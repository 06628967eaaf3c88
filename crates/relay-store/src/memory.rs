use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::WorkflowStore;
use crate::types::{StoredWorkflow, WorkflowSummary};

/// In-memory store, for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
  workflows: RwLock<BTreeMap<String, StoredWorkflow>>,
}

impl MemoryWorkflowStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
  async fn get(&self, workflow_id: &str) -> Result<Option<StoredWorkflow>, StoreError> {
    let workflows = self.workflows.read().unwrap_or_else(|e| e.into_inner());
    Ok(workflows.get(workflow_id).cloned())
  }

  async fn put(&self, workflow: &StoredWorkflow) -> Result<(), StoreError> {
    let mut workflows = self.workflows.write().unwrap_or_else(|e| e.into_inner());
    workflows.insert(workflow.id().to_string(), workflow.clone());
    Ok(())
  }

  async fn list(&self) -> Result<Vec<WorkflowSummary>, StoreError> {
    let workflows = self.workflows.read().unwrap_or_else(|e| e.into_inner());
    Ok(workflows.values().map(StoredWorkflow::summary).collect())
  }

  async fn delete(&self, workflow_id: &str) -> Result<bool, StoreError> {
    let mut workflows = self.workflows.write().unwrap_or_else(|e| e.into_inner());
    Ok(workflows.remove(workflow_id).is_some())
  }
}
