use chrono::{DateTime, Utc};
use relay_compiler::CompiledPipeline;
use relay_config::{StepBindings, WorkflowDefinition};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A saved workflow together with its compiled artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWorkflow {
  pub definition: WorkflowDefinition,
  #[serde(default)]
  pub bindings: StepBindings,
  /// Withheld when the workflow cannot be executed at all.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pipeline: Option<CompiledPipeline>,
  /// Compile errors from the last save.
  #[serde(default)]
  pub compile_errors: Vec<String>,
  pub saved_at: DateTime<Utc>,
}

impl StoredWorkflow {
  pub fn id(&self) -> &str {
    &self.definition.id
  }

  pub fn summary(&self) -> WorkflowSummary {
    WorkflowSummary {
      id: self.definition.id.clone(),
      name: self.definition.name.clone(),
      published: self.definition.published,
      step_count: self.definition.steps.len(),
      executable: self.pipeline.is_some(),
      warning_count: self.compile_errors.len(),
      saved_at: self.saved_at,
    }
  }
}

/// One row of a workflow listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
  pub id: String,
  pub name: String,
  pub published: bool,
  pub step_count: usize,
  /// A compiled pipeline is stored.
  pub executable: bool,
  pub warning_count: usize,
  pub saved_at: DateTime<Utc>,
}

/// Reject ids that cannot safely name a file or directory.
pub(crate) fn check_id(workflow_id: &str) -> Result<(), StoreError> {
  let valid = !workflow_id.is_empty()
    && !workflow_id.starts_with('.')
    && workflow_id
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

  if valid {
    Ok(())
  } else {
    Err(StoreError::InvalidId(workflow_id.to_string()))
  }
}
