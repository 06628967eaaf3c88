//! Field binding compilation.
//!
//! Turns a step's declared [`FieldBindings`] into a [`Mapper`] that runs just
//! before the step and builds its input object.
//!
//! # Sources
//! - `step-output`: a field of a specific earlier step's output, addressed by a
//!   dotted path. A leading legacy `data.` segment is dropped, so `data.title`
//!   and `title` both read `title`. An empty path selects the whole output.
//! - `workflow-input`: a field of the input the workflow was invoked with. This
//!   is always the pipeline's initial input, never the previous step's.
//! - `literal`: a value fixed at compile time.
//!
//! ```json
//! { "body": { "sourceType": "step-output", "sourceStepId": "extract", "sourcePath": "data.title" } }
//! ```
//!
//! compiles to the mapping line `body <- steps["extract"].output.title`.

use std::collections::HashMap;

use relay_config::{FieldBinding, FieldBindings, SourceType, StepType, WorkflowStep};
use relay_schema::{is_identifier, quote_key};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CompileError;

/// Legacy prefix that older editors wrote in front of step output paths.
const LEGACY_DATA_PREFIX: &str = "data.";

/// Builds a step's input from earlier outputs, the workflow input and literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapper {
  pub fields: Vec<FieldMapping>,
}

/// One mapped input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
  pub target: String,
  pub source: MappedSource,
}

/// Resolved source of a mapped field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum MappedSource {
  StepOutput { step_id: String, path: Vec<String> },
  WorkflowInput { path: Vec<String> },
  Literal { value: Value },
}

/// Values a mapper can read from during a run.
#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
  /// The input the workflow was invoked with.
  pub workflow_input: &'a Value,
  /// Outputs of completed steps, keyed by step id.
  pub step_outputs: &'a HashMap<String, Value>,
}

impl Mapper {
  /// Build the mapped input object.
  ///
  /// Fields whose source does not resolve are left out.
  pub fn apply(&self, ctx: &MapContext<'_>) -> Value {
    let mut object = serde_json::Map::new();

    for field in &self.fields {
      if let Some(value) = field.source.resolve(ctx) {
        object.insert(field.target.clone(), value);
      }
    }

    Value::Object(object)
  }

  /// Render one `target <- source` line per field.
  pub fn render_lines(&self) -> Vec<String> {
    self
      .fields
      .iter()
      .map(|field| format!("{} <- {}", quote_key(&field.target), field.source.render()))
      .collect()
  }
}

impl MappedSource {
  fn resolve(&self, ctx: &MapContext<'_>) -> Option<Value> {
    match self {
      MappedSource::StepOutput { step_id, path } => ctx
        .step_outputs
        .get(step_id)
        .and_then(|output| lookup_path(output, path))
        .cloned(),
      MappedSource::WorkflowInput { path } => lookup_path(ctx.workflow_input, path).cloned(),
      MappedSource::Literal { value } => Some(value.clone()),
    }
  }

  /// Render as source text.
  pub fn render(&self) -> String {
    match self {
      MappedSource::StepOutput { step_id, path } => format!(
        "steps[{}].output{}",
        Value::String(step_id.clone()),
        render_path(path)
      ),
      MappedSource::WorkflowInput { path } => format!("input{}", render_path(path)),
      MappedSource::Literal { value } => format!("literal({})", value),
    }
  }
}

/// Walk a path of object keys (and numeric array indices) into a value.
pub fn lookup_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
  path.iter().try_fold(value, |current, segment| match current {
    Value::Object(map) => map.get(segment),
    Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
    _ => None,
  })
}

/// Split a dotted path into segments, ignoring empty ones.
fn split_path(path: &str) -> Vec<String> {
  path
    .split('.')
    .filter(|segment| !segment.is_empty())
    .map(str::to_string)
    .collect()
}

/// Normalize a step output path, dropping the legacy `data.` prefix.
fn step_output_path(path: Option<&str>) -> Vec<String> {
  let path = path.unwrap_or_default().trim();
  split_path(path.strip_prefix(LEGACY_DATA_PREFIX).unwrap_or(path))
}

fn render_path(path: &[String]) -> String {
  path
    .iter()
    .map(|segment| {
      if is_identifier(segment) {
        format!(".{}", segment)
      } else {
        format!("[{}]", quote_key(segment))
      }
    })
    .collect()
}

/// Compile the bindings of `owner` into a mapper.
///
/// `steps` holds every step of the workflow by id. All problems with the
/// step's bindings are returned together.
pub(crate) fn compile_bindings(
  owner: &WorkflowStep,
  bindings: &FieldBindings,
  steps: &HashMap<&str, &WorkflowStep>,
) -> Result<Mapper, Vec<CompileError>> {
  let mut fields = Vec::with_capacity(bindings.len());
  let mut errors = Vec::new();

  for (target, binding) in bindings {
    match compile_field(owner, target, binding, steps) {
      Ok(source) => fields.push(FieldMapping {
        target: target.clone(),
        source,
      }),
      Err(e) => errors.push(e),
    }
  }

  if errors.is_empty() {
    Ok(Mapper { fields })
  } else {
    Err(errors)
  }
}

fn compile_field(
  owner: &WorkflowStep,
  field: &str,
  binding: &FieldBinding,
  steps: &HashMap<&str, &WorkflowStep>,
) -> Result<MappedSource, CompileError> {
  match binding.source_type {
    SourceType::StepOutput => {
      let source_step_id = binding
        .source_step_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CompileError::IncompleteBinding {
          step_id: owner.id.clone(),
          field: field.to_string(),
          missing: "sourceStepId",
        })?;

      if source_step_id == owner.id {
        return Err(CompileError::SelfReference {
          step_id: owner.id.clone(),
          field: field.to_string(),
        });
      }

      let source = steps
        .get(source_step_id)
        .ok_or_else(|| CompileError::UnknownSourceStep {
          step_id: owner.id.clone(),
          field: field.to_string(),
          source_step_id: source_step_id.to_string(),
        })?;

      if source.list_index >= owner.list_index {
        return Err(CompileError::ForwardReference {
          step_id: owner.id.clone(),
          field: field.to_string(),
          source_step_id: source_step_id.to_string(),
        });
      }

      if source.step_type == StepType::ControlFlow {
        return Err(CompileError::ControlFlowSource {
          step_id: owner.id.clone(),
          field: field.to_string(),
          source_step_id: source_step_id.to_string(),
        });
      }

      Ok(MappedSource::StepOutput {
        step_id: source_step_id.to_string(),
        path: step_output_path(binding.source_path.as_deref()),
      })
    }
    SourceType::WorkflowInput => {
      let name = binding
        .workflow_input_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| CompileError::IncompleteBinding {
          step_id: owner.id.clone(),
          field: field.to_string(),
          missing: "workflowInputName",
        })?;

      Ok(MappedSource::WorkflowInput {
        path: split_path(name.trim()),
      })
    }
    SourceType::Literal => Ok(MappedSource::Literal {
      value: binding.literal_value.clone().unwrap_or(Value::Null),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn steps() -> Vec<WorkflowStep> {
    vec![
      WorkflowStep::external_tool("fetch", 0, "FETCH_PAGE", "web"),
      WorkflowStep::custom_code("extract", 1, "return input"),
      WorkflowStep::external_tool("send", 2, "SEND_EMAIL", "gmail"),
    ]
  }

  fn compile(owner: &str, bindings: FieldBindings) -> Result<Mapper, Vec<CompileError>> {
    let steps = steps();
    let by_id: HashMap<&str, &WorkflowStep> = steps.iter().map(|s| (s.id.as_str(), s)).collect();
    compile_bindings(by_id[owner], &bindings, &by_id)
  }

  fn run(mapper: &Mapper, input: Value, outputs: &[(&str, Value)]) -> Value {
    let step_outputs: HashMap<String, Value> = outputs
      .iter()
      .map(|(k, v)| (k.to_string(), v.clone()))
      .collect();
    mapper.apply(&MapContext {
      workflow_input: &input,
      step_outputs: &step_outputs,
    })
  }

  #[test]
  fn test_legacy_data_prefix_is_stripped() {
    let output = json!({ "title": "x" });

    for path in ["data.title", "title"] {
      let mapper = compile(
        "send",
        FieldBindings::from([("body".to_string(), FieldBinding::step_output("extract", path))]),
      )
      .unwrap();

      let mapped = run(&mapper, json!({}), &[("extract", output.clone())]);
      assert_eq!(mapped, json!({ "body": "x" }), "path {path}");
    }
  }

  #[test]
  fn test_nested_path_and_array_index() {
    let mapper = compile(
      "send",
      FieldBindings::from([
        (
          "first".to_string(),
          FieldBinding::step_output("fetch", "items.0.name"),
        ),
        ("whole".to_string(), FieldBinding::step_output("fetch", "")),
      ]),
    )
    .unwrap();

    let output = json!({ "items": [{ "name": "a" }, { "name": "b" }] });
    let mapped = run(&mapper, json!({}), &[("fetch", output.clone())]);
    assert_eq!(mapped["first"], "a");
    assert_eq!(mapped["whole"], output);
  }

  #[test]
  fn test_workflow_input_and_literal() {
    let mapper = compile(
      "send",
      FieldBindings::from([
        ("to".to_string(), FieldBinding::workflow_input("email")),
        ("subject".to_string(), FieldBinding::literal("Digest")),
      ]),
    )
    .unwrap();

    let mapped = run(
      &mapper,
      json!({ "email": "a@b.com" }),
      &[("extract", json!({ "email": "wrong@b.com" }))],
    );
    assert_eq!(mapped, json!({ "to": "a@b.com", "subject": "Digest" }));
  }

  #[test]
  fn test_unresolved_fields_are_omitted() {
    let mapper = compile(
      "send",
      FieldBindings::from([
        ("body".to_string(), FieldBinding::step_output("extract", "missing")),
        ("to".to_string(), FieldBinding::workflow_input("email")),
      ]),
    )
    .unwrap();

    let mapped = run(&mapper, json!({}), &[]);
    assert_eq!(mapped, json!({}));
  }

  #[test]
  fn test_self_and_forward_references_are_errors() {
    let errors = compile(
      "extract",
      FieldBindings::from([
        ("a".to_string(), FieldBinding::step_output("extract", "x")),
        ("b".to_string(), FieldBinding::step_output("send", "x")),
      ]),
    )
    .unwrap_err();

    assert_eq!(
      errors,
      vec![
        CompileError::SelfReference {
          step_id: "extract".to_string(),
          field: "a".to_string(),
        },
        CompileError::ForwardReference {
          step_id: "extract".to_string(),
          field: "b".to_string(),
          source_step_id: "send".to_string(),
        },
      ]
    );
  }

  #[test]
  fn test_dangling_and_incomplete_bindings() {
    let mut incomplete = FieldBinding::workflow_input("x");
    incomplete.workflow_input_name = None;

    let errors = compile(
      "send",
      FieldBindings::from([
        ("a".to_string(), FieldBinding::step_output("ghost", "x")),
        ("b".to_string(), incomplete),
      ]),
    )
    .unwrap_err();

    assert!(matches!(
      &errors[0],
      CompileError::UnknownSourceStep { source_step_id, .. } if source_step_id == "ghost"
    ));
    assert!(matches!(
      &errors[1],
      CompileError::IncompleteBinding { missing: "workflowInputName", .. }
    ));
  }

  #[test]
  fn test_render_lines_quote_unsafe_names() {
    let mapper = compile(
      "send",
      FieldBindings::from([
        (
          "first name".to_string(),
          FieldBinding::step_output("fetch", "data.user.full name"),
        ),
        ("to".to_string(), FieldBinding::workflow_input("email")),
        ("n".to_string(), FieldBinding::literal(3)),
      ]),
    )
    .unwrap();

    assert_eq!(
      mapper.render_lines(),
      vec![
        r#""first name" <- steps["fetch"].output.user["full name"]"#.to_string(),
        "n <- literal(3)".to_string(),
        "to <- input.email".to_string(),
      ]
    );
  }

  #[test]
  fn test_lookup_path() {
    let value = json!({ "a": { "b": [10, 20] } });
    let path = |p: &str| split_path(p);
    assert_eq!(lookup_path(&value, &path("a.b.1")), Some(&json!(20)));
    assert_eq!(lookup_path(&value, &path("a.c")), None);
    assert_eq!(lookup_path(&value, &path("a.b.x")), None);
    assert_eq!(lookup_path(&value, &[]), Some(&value));
  }
}
