use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::schema::TypeDescriptor;
use crate::step::WorkflowStep;

/// Workflow-level control-flow descriptor. Only `sequential` is executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlow {
  #[serde(rename = "type")]
  pub kind: String,
}

impl ControlFlow {
  pub const SEQUENTIAL: &'static str = "sequential";

  pub fn sequential() -> Self {
    Self {
      kind: Self::SEQUENTIAL.to_string(),
    }
  }

  pub fn is_sequential(&self) -> bool {
    self.kind == Self::SEQUENTIAL
  }
}

impl Default for ControlFlow {
  fn default() -> Self {
    Self::sequential()
  }
}

/// A workflow as saved by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
  pub id: String,
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<TypeDescriptor>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<TypeDescriptor>,

  #[serde(default)]
  pub steps: Vec<WorkflowStep>,

  /// Legacy visual mappings. Carried through untouched.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub mappings: Vec<serde_json::Value>,

  #[serde(default)]
  pub control_flow: ControlFlow,

  /// Connections declared by the editor. The compiler derives its own set.
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub required_connections: BTreeSet<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub runtime_inputs: Vec<serde_json::Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub config: Option<serde_json::Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,

  #[serde(default)]
  pub published: bool,
}

impl WorkflowDefinition {
  /// An empty definition, as the editor creates it.
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      description: None,
      input_schema: None,
      output_schema: None,
      steps: Vec::new(),
      mappings: Vec::new(),
      control_flow: ControlFlow::default(),
      required_connections: BTreeSet::new(),
      runtime_inputs: Vec::new(),
      config: None,
      created_at: None,
      updated_at: None,
      published: false,
    }
  }

  /// Get a step by ID.
  pub fn get_step(&self, step_id: &str) -> Option<&WorkflowStep> {
    self.steps.iter().find(|s| s.id == step_id)
  }

  /// Steps in execution order (ascending `listIndex`, ties keep declaration order).
  pub fn ordered_steps(&self) -> Vec<&WorkflowStep> {
    let mut steps: Vec<&WorkflowStep> = self.steps.iter().collect();
    steps.sort_by_key(|s| s.list_index);
    steps
  }

  /// Check the definition against its declared shape.
  ///
  /// Only ids are checked here. A step missing its tool or code is still a
  /// valid draft; the compiler reports it.
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.id.trim().is_empty() {
      return Err(ValidationError::MissingWorkflowId);
    }

    let mut seen = HashSet::new();
    for (position, step) in self.steps.iter().enumerate() {
      if step.id.trim().is_empty() {
        return Err(ValidationError::EmptyStepId { position });
      }
      if !seen.insert(step.id.as_str()) {
        return Err(ValidationError::DuplicateStepId {
          step_id: step.id.clone(),
        });
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::step::StepType;
  use serde_json::json;

  #[test]
  fn test_minimal_definition_defaults() {
    let def: WorkflowDefinition = serde_json::from_value(json!({
      "id": "wf-1",
      "name": "Digest"
    }))
    .unwrap();

    assert!(def.steps.is_empty());
    assert!(def.control_flow.is_sequential());
    assert!(!def.published);
    assert!(def.validate().is_ok());
  }

  #[test]
  fn test_ordered_steps_by_list_index() {
    let mut def = WorkflowDefinition::new("wf", "wf");
    def.steps = vec![
      WorkflowStep::custom_code("a", 0, "return input"),
      WorkflowStep::custom_code("c", 2, "return input"),
      WorkflowStep::custom_code("b", 1, "return input"),
    ];

    let order: Vec<&str> = def.ordered_steps().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
  }

  #[test]
  fn test_validate_duplicate_step_ids() {
    let mut def = WorkflowDefinition::new("wf", "wf");
    def.steps = vec![
      WorkflowStep::custom_code("a", 0, "return input"),
      WorkflowStep::custom_code("a", 1, "return input"),
    ];

    assert_eq!(
      def.validate(),
      Err(ValidationError::DuplicateStepId {
        step_id: "a".to_string()
      })
    );
  }

  #[test]
  fn test_validate_accepts_unfinished_steps() {
    let mut def = WorkflowDefinition::new("wf", "wf");
    def.steps = vec![
      WorkflowStep::new("t", StepType::ExternalTool, 0),
      WorkflowStep::custom_code("c", 1, "  "),
    ];

    assert!(def.validate().is_ok());
  }

  #[test]
  fn test_validate_empty_ids() {
    let def = WorkflowDefinition::new("", "wf");
    assert_eq!(def.validate(), Err(ValidationError::MissingWorkflowId));

    let mut def = WorkflowDefinition::new("wf", "wf");
    def.steps = vec![WorkflowStep::custom_code("", 0, "return 1")];
    assert_eq!(
      def.validate(),
      Err(ValidationError::EmptyStepId { position: 0 })
    );
  }
}
