//! Textual rendering of compiled pipelines.
//!
//! The rendered text is what gets stored for human review next to the
//! pipeline. It is derived only from the pipeline, so identical pipelines
//! render to identical bytes.

use minijinja::{AutoEscape, Environment};
use relay_config::RecordsOperation;
use serde::Serialize;
use serde_json::Value;

use crate::pipeline::{CompiledPipeline, CompiledStep, StepProcedure};

const PIPELINE_TEMPLATE: &str = r#"# workflow {{ workflow_id }}: {{ name }}
# steps: {{ step_count }} declared, {{ steps | length }} compiled
# requires: {{ required }}
input  = {{ input }}
output = {{ output }}
{% for step in steps %}

step {{ step.id }} {{ step.step_id }} ({{ step.kind }})
  name   = {{ step.name }}
  input  = {{ step.input }}
  output = {{ step.output }}
{% if step.mapping %}
  map {
{% for line in step.mapping %}
    {{ line }}
{% endfor %}
  }
{% endif %}
  run    = {{ step.run }}
{% for line in step.code %}
    | {{ line }}
{% endfor %}
{% endfor %}
"#;

#[derive(Serialize)]
struct PipelineView {
  workflow_id: String,
  name: String,
  step_count: usize,
  required: String,
  input: String,
  output: String,
  steps: Vec<StepView>,
}

#[derive(Serialize)]
struct StepView {
  id: String,
  step_id: String,
  kind: &'static str,
  name: String,
  input: String,
  output: String,
  mapping: Vec<String>,
  run: String,
  code: Vec<String>,
}

pub(crate) fn render_pipeline(pipeline: &CompiledPipeline) -> Result<String, minijinja::Error> {
  let mut env = Environment::new();
  env.set_trim_blocks(true);
  env.set_lstrip_blocks(true);
  env.set_auto_escape_callback(|_| AutoEscape::None);
  env.add_template("pipeline", PIPELINE_TEMPLATE)?;

  let required = if pipeline.metadata.required_connections.is_empty() {
    "none".to_string()
  } else {
    pipeline
      .metadata
      .required_connections
      .iter()
      .cloned()
      .collect::<Vec<_>>()
      .join(", ")
  };

  let view = PipelineView {
    workflow_id: quoted(&pipeline.workflow_id),
    name: quoted(&pipeline.name),
    step_count: pipeline.metadata.step_count,
    required,
    input: pipeline.input_validator.render(),
    output: pipeline.output_validator.render(),
    steps: pipeline.steps.iter().map(step_view).collect(),
  };

  env.get_template("pipeline")?.render(view)
}

fn step_view(step: &CompiledStep) -> StepView {
  StepView {
    id: step.id.clone(),
    step_id: quoted(&step.step_id),
    kind: step.procedure.kind(),
    name: quoted(&step.name),
    input: step.input_validator.render(),
    output: step.output_validator.render(),
    mapping: step
      .mapper
      .as_ref()
      .map(|m| m.render_lines())
      .unwrap_or_default(),
    run: render_procedure(&step.procedure),
    code: match &step.procedure {
      StepProcedure::CustomCode { source } => source.lines().map(str::to_string).collect(),
      _ => Vec::new(),
    },
  }
}

fn render_procedure(procedure: &StepProcedure) -> String {
  match procedure {
    StepProcedure::ExternalTool {
      tool_id,
      toolkit_slug,
      requires_auth,
    } => {
      let account = if *requires_auth {
        format!("connections[{}]", quoted(toolkit_slug))
      } else {
        "none".to_string()
      };
      format!("tool({}, account = {})", quoted(tool_id), account)
    }
    StepProcedure::CustomCode { .. } => "code(input)".to_string(),
    StepProcedure::Records {
      operation,
      table_id,
    } => {
      let verb = match operation {
        RecordsOperation::Query => "query",
        RecordsOperation::Write => "write",
      };
      let table = table_id.as_deref().map(quoted).unwrap_or_else(|| "none".to_string());
      format!("records.{}(table = {})", verb, table)
    }
  }
}

fn quoted(text: &str) -> String {
  Value::String(text.to_string()).to_string()
}
