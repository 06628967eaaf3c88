use serde::{Deserialize, Serialize};

use crate::schema::TypeDescriptor;

/// The kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepType {
  /// Dispatch to a third-party integration through the tool collaborator.
  ExternalTool,
  /// Caller-authored code executed verbatim.
  CustomCode,
  /// Branch, loop or parallel block. Detected and rejected by the compiler.
  ControlFlow,
  /// Read from the records collaborator.
  TableQuery,
  /// Write to the records collaborator.
  TableWrite,
}

/// Operation handed to the records collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordsOperation {
  Query,
  Write,
}

impl StepType {
  /// The records operation for table steps.
  pub fn records_operation(&self) -> Option<RecordsOperation> {
    match self {
      StepType::TableQuery => Some(RecordsOperation::Query),
      StepType::TableWrite => Some(RecordsOperation::Write),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      StepType::ExternalTool => "externalTool",
      StepType::CustomCode => "customCode",
      StepType::ControlFlow => "controlFlow",
      StepType::TableQuery => "tableQuery",
      StepType::TableWrite => "tableWrite",
    }
  }
}

/// One unit of work in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
  pub id: String,

  #[serde(rename = "type")]
  pub step_type: StepType,

  /// Serial execution order. Lower runs first.
  pub list_index: u32,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool_id: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub toolkit_slug: Option<String>,

  /// The toolkit can be called without an authorized account.
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub no_auth: bool,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,

  /// Control-flow kind (`branch`, `loop`, `parallel`, ...) for `controlFlow` steps.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub control_type: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub table_id: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<TypeDescriptor>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<TypeDescriptor>,
}

/// Borrowed view of an external tool step's tool reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolRef<'a> {
  pub tool_id: &'a str,
  pub toolkit_slug: &'a str,
  pub no_auth: bool,
}

impl WorkflowStep {
  /// Create a step of the given type with everything else empty.
  pub fn new(id: impl Into<String>, step_type: StepType, list_index: u32) -> Self {
    Self {
      id: id.into(),
      step_type,
      list_index,
      name: None,
      tool_id: None,
      toolkit_slug: None,
      no_auth: false,
      code: None,
      control_type: None,
      table_id: None,
      input_schema: None,
      output_schema: None,
    }
  }

  /// An external tool step.
  pub fn external_tool(
    id: impl Into<String>,
    list_index: u32,
    tool_id: impl Into<String>,
    toolkit_slug: impl Into<String>,
  ) -> Self {
    Self {
      tool_id: Some(tool_id.into()),
      toolkit_slug: Some(toolkit_slug.into()),
      ..Self::new(id, StepType::ExternalTool, list_index)
    }
  }

  /// A custom code step.
  pub fn custom_code(id: impl Into<String>, list_index: u32, code: impl Into<String>) -> Self {
    Self {
      code: Some(code.into()),
      ..Self::new(id, StepType::CustomCode, list_index)
    }
  }

  /// Name shown to users; falls back to the id.
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or(&self.id)
  }

  /// The tool reference, when both halves are present and non-empty.
  pub fn tool_ref(&self) -> Option<ToolRef<'_>> {
    let tool_id = self.tool_id.as_deref().filter(|t| !t.is_empty())?;
    let toolkit_slug = self.toolkit_slug.as_deref().filter(|t| !t.is_empty())?;
    Some(ToolRef {
      tool_id,
      toolkit_slug,
      no_auth: self.no_auth,
    })
  }

  /// The control-flow kind of a `controlFlow` step.
  pub fn control_kind(&self) -> &str {
    self
      .control_type
      .as_deref()
      .filter(|c| !c.is_empty())
      .unwrap_or(StepType::ControlFlow.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deserialize_external_tool_step() {
    let step: WorkflowStep = serde_json::from_value(json!({
      "id": "send",
      "type": "externalTool",
      "listIndex": 2,
      "toolId": "GMAIL_SEND_EMAIL",
      "toolkitSlug": "gmail"
    }))
    .unwrap();

    assert_eq!(step.step_type, StepType::ExternalTool);
    assert_eq!(step.list_index, 2);
    assert_eq!(
      step.tool_ref(),
      Some(ToolRef {
        tool_id: "GMAIL_SEND_EMAIL",
        toolkit_slug: "gmail",
        no_auth: false,
      })
    );
    assert_eq!(step.display_name(), "send");
  }

  #[test]
  fn test_tool_ref_requires_both_halves() {
    let mut step = WorkflowStep::external_tool("s", 0, "TOOL", "");
    assert_eq!(step.tool_ref(), None);

    step.toolkit_slug = Some("kit".to_string());
    step.tool_id = None;
    assert_eq!(step.tool_ref(), None);
  }

  #[test]
  fn test_control_kind_defaults_to_type_name() {
    let mut step = WorkflowStep::new("c", StepType::ControlFlow, 1);
    assert_eq!(step.control_kind(), "controlFlow");

    step.control_type = Some("branch".to_string());
    assert_eq!(step.control_kind(), "branch");
  }
}
