//! Declared data sources for step input fields.
//!
//! Bindings are stored separately from the definition, keyed by step id and
//! then by target field name:
//!
//! ```json
//! {
//!   "send-email": {
//!     "body": { "sourceType": "step-output", "sourceStepId": "extract", "sourcePath": "title" },
//!     "to": { "sourceType": "workflow-input", "workflowInputName": "email" },
//!     "subject": { "sourceType": "literal", "literalValue": "Daily digest" }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where a bound field takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
  /// A field of an earlier step's output.
  #[serde(alias = "step_output", alias = "stepOutput")]
  StepOutput,
  /// A field of the original workflow invocation input.
  #[serde(alias = "workflow_input", alias = "workflowInput")]
  WorkflowInput,
  /// A value fixed at compile time.
  Literal,
}

/// The declared source for one step input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldBinding {
  pub source_type: SourceType,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_step_id: Option<String>,

  /// Dotted path into the source step's output.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_path: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow_input_name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub literal_value: Option<serde_json::Value>,
}

/// Bindings for one step, keyed by target field name.
pub type FieldBindings = BTreeMap<String, FieldBinding>;

/// Bindings for a whole workflow, keyed by step id.
pub type StepBindings = BTreeMap<String, FieldBindings>;

impl FieldBinding {
  pub fn step_output(step_id: impl Into<String>, path: impl Into<String>) -> Self {
    Self {
      source_type: SourceType::StepOutput,
      source_step_id: Some(step_id.into()),
      source_path: Some(path.into()),
      workflow_input_name: None,
      literal_value: None,
    }
  }

  pub fn workflow_input(name: impl Into<String>) -> Self {
    Self {
      source_type: SourceType::WorkflowInput,
      source_step_id: None,
      source_path: None,
      workflow_input_name: Some(name.into()),
      literal_value: None,
    }
  }

  pub fn literal(value: impl Into<serde_json::Value>) -> Self {
    Self {
      source_type: SourceType::Literal,
      source_step_id: None,
      source_path: None,
      workflow_input_name: None,
      literal_value: Some(value.into()),
    }
  }
}
