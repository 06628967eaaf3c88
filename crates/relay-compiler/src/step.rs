//! Step compilation.
//!
//! Each executable step becomes one [`CompiledStep`]: validators from its
//! schemas, a procedure chosen by its type, and a mapper when it has bindings.
//! Control-flow steps are never compiled.

use std::collections::HashMap;

use relay_config::{FieldBindings, StepType, WorkflowStep};
use relay_schema::translate;

use crate::binding::compile_bindings;
use crate::error::CompileError;
use crate::pipeline::{CompiledStep, StepProcedure};

/// Deterministic compiled id for the step at `position` in execution order.
pub fn compiled_id(position: usize, step_id: &str) -> String {
  let sanitized: String = step_id
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect();
  format!("step{}_{}", position, sanitized)
}

/// Compile one step.
pub(crate) fn compile_step(
  step: &WorkflowStep,
  position: usize,
  bindings: Option<&FieldBindings>,
  steps: &HashMap<&str, &WorkflowStep>,
) -> Result<CompiledStep, Vec<CompileError>> {
  let procedure = procedure_for(step).map_err(|e| vec![e])?;

  let mapper = match bindings.filter(|b| !b.is_empty()) {
    Some(bindings) => Some(compile_bindings(step, bindings, steps)?),
    None => None,
  };

  Ok(CompiledStep {
    id: compiled_id(position, &step.id),
    step_id: step.id.clone(),
    name: step.display_name().to_string(),
    list_index: step.list_index,
    input_validator: translate(step.input_schema.as_ref()),
    output_validator: translate(step.output_schema.as_ref()),
    mapper,
    procedure,
  })
}

fn procedure_for(step: &WorkflowStep) -> Result<StepProcedure, CompileError> {
  match step.step_type {
    StepType::ExternalTool => {
      let tool = step.tool_ref().ok_or_else(|| CompileError::IncompleteStep {
        step_id: step.id.clone(),
        message: "missing tool reference".to_string(),
      })?;
      Ok(StepProcedure::ExternalTool {
        tool_id: tool.tool_id.to_string(),
        toolkit_slug: tool.toolkit_slug.to_string(),
        requires_auth: !tool.no_auth,
      })
    }
    StepType::CustomCode => {
      let source = step
        .code
        .clone()
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| CompileError::IncompleteStep {
          step_id: step.id.clone(),
          message: "missing code".to_string(),
        })?;
      Ok(StepProcedure::CustomCode { source })
    }
    StepType::TableQuery | StepType::TableWrite => {
      let operation = step.step_type.records_operation().ok_or_else(|| {
        CompileError::IncompleteStep {
          step_id: step.id.clone(),
          message: "not a records step".to_string(),
        }
      })?;
      Ok(StepProcedure::Records {
        operation,
        table_id: step.table_id.clone(),
      })
    }
    StepType::ControlFlow => Err(CompileError::UnsupportedControlFlow {
      kinds: vec![step.control_kind().to_string()],
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use relay_config::{FieldBinding, RecordsOperation, TypeDescriptor};
  use relay_schema::Validator;

  fn no_steps() -> HashMap<&'static str, &'static WorkflowStep> {
    HashMap::new()
  }

  #[test]
  fn test_compiled_id_is_sanitized() {
    assert_eq!(compiled_id(0, "fetch-page"), "step0_fetch_page");
    assert_eq!(compiled_id(12, "send email!"), "step12_send_email_");
  }

  #[test]
  fn test_external_tool_step() {
    let mut step = WorkflowStep::external_tool("send", 2, "GMAIL_SEND", "gmail");
    step.name = Some("Send email".to_string());
    step.input_schema = Some(TypeDescriptor::object(
      [("to", TypeDescriptor::of("string"))],
      &["to"],
    ));

    let compiled = compile_step(&step, 2, None, &no_steps()).unwrap();

    assert_eq!(compiled.id, "step2_send");
    assert_eq!(compiled.name, "Send email");
    assert!(compiled.mapper.is_none());
    assert!(matches!(compiled.input_validator, Validator::Object { .. }));
    assert_eq!(compiled.output_validator, Validator::Any);
    assert_eq!(
      compiled.procedure,
      StepProcedure::ExternalTool {
        tool_id: "GMAIL_SEND".to_string(),
        toolkit_slug: "gmail".to_string(),
        requires_auth: true,
      }
    );
  }

  #[test]
  fn test_no_auth_tool_does_not_require_auth() {
    let mut step = WorkflowStep::external_tool("weather", 0, "GET_WEATHER", "weather");
    step.no_auth = true;

    let compiled = compile_step(&step, 0, None, &no_steps()).unwrap();
    assert!(matches!(
      compiled.procedure,
      StepProcedure::ExternalTool {
        requires_auth: false,
        ..
      }
    ));
  }

  #[test]
  fn test_custom_code_is_kept_verbatim() {
    let source = "local t = input.html\nreturn { title = t }";
    let step = WorkflowStep::custom_code("extract", 1, source);

    let compiled = compile_step(&step, 1, None, &no_steps()).unwrap();
    assert_eq!(
      compiled.procedure,
      StepProcedure::CustomCode {
        source: source.to_string()
      }
    );
  }

  #[test]
  fn test_table_steps_pass_through_to_records() {
    let mut step = WorkflowStep::new("rows", StepType::TableWrite, 0);
    step.table_id = Some("tbl_1".to_string());

    let compiled = compile_step(&step, 0, None, &no_steps()).unwrap();
    assert_eq!(
      compiled.procedure,
      StepProcedure::Records {
        operation: RecordsOperation::Write,
        table_id: Some("tbl_1".to_string()),
      }
    );
    assert_eq!(compiled.procedure.kind(), "tableWrite");
  }

  #[test]
  fn test_control_flow_is_rejected() {
    let mut step = WorkflowStep::new("branch", StepType::ControlFlow, 0);
    step.control_type = Some("branch".to_string());

    let errors = compile_step(&step, 0, None, &no_steps()).unwrap_err();
    assert_eq!(errors[0].to_string(), "not yet supported: branch");
  }

  #[test]
  fn test_empty_bindings_produce_no_mapper() {
    let step = WorkflowStep::custom_code("a", 0, "return input");
    let compiled = compile_step(&step, 0, Some(&FieldBindings::new()), &no_steps()).unwrap();
    assert!(compiled.mapper.is_none());

    let bindings = FieldBindings::from([("x".to_string(), FieldBinding::literal(1))]);
    let compiled = compile_step(&step, 0, Some(&bindings), &no_steps()).unwrap();
    assert_eq!(compiled.mapper.unwrap().fields.len(), 1);
  }

  #[test]
  fn test_unfinished_steps_are_incomplete() {
    let tool = WorkflowStep::new("pick-a-tool", StepType::ExternalTool, 0);
    let errors = compile_step(&tool, 0, None, &no_steps()).unwrap_err();
    assert_eq!(
      errors,
      vec![CompileError::IncompleteStep {
        step_id: "pick-a-tool".to_string(),
        message: "missing tool reference".to_string(),
      }]
    );

    let code = WorkflowStep::custom_code("blank", 1, " \n ");
    let errors = compile_step(&code, 1, None, &no_steps()).unwrap_err();
    assert_eq!(errors[0].to_string(), "step 'blank': missing code");
  }
}
