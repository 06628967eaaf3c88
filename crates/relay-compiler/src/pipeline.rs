//! Compiled pipeline types.

use std::collections::{BTreeMap, BTreeSet};

use relay_config::RecordsOperation;
use relay_schema::Validator;
use serde::{Deserialize, Serialize};

use crate::binding::Mapper;
use crate::error::CompileError;

/// What a compiled step does when it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepProcedure {
  /// Dispatch to the tool collaborator using the run's account for `toolkit_slug`.
  ExternalTool {
    tool_id: String,
    toolkit_slug: String,
    requires_auth: bool,
  },
  /// Caller-authored code, run verbatim by the code runner. Not sandboxed.
  CustomCode { source: String },
  /// Hand the input to the records collaborator.
  Records {
    operation: RecordsOperation,
    table_id: Option<String>,
  },
}

impl StepProcedure {
  pub fn kind(&self) -> &'static str {
    match self {
      StepProcedure::ExternalTool { .. } => "externalTool",
      StepProcedure::CustomCode { .. } => "customCode",
      StepProcedure::Records {
        operation: RecordsOperation::Query,
        ..
      } => "tableQuery",
      StepProcedure::Records {
        operation: RecordsOperation::Write,
        ..
      } => "tableWrite",
    }
  }
}

/// One executable unit of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStep {
  /// Generated identifier, unique within the pipeline.
  pub id: String,
  /// Id of the step in the workflow definition.
  pub step_id: String,
  pub name: String,
  pub list_index: u32,
  pub input_validator: Validator,
  pub output_validator: Validator,
  /// Runs before the procedure when the step has bindings.
  pub mapper: Option<Mapper>,
  pub procedure: StepProcedure,
}

/// Facts about a pipeline that callers need without running it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetadata {
  /// Toolkits the caller must have authorized accounts for.
  pub required_connections: BTreeSet<String>,
  /// Steps in the definition, including control-flow steps that never run.
  pub step_count: usize,
}

/// An executable workflow.
///
/// Immutable once built; share it behind an `Arc` across concurrent runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPipeline {
  pub workflow_id: String,
  pub name: String,
  pub input_validator: Validator,
  pub output_validator: Validator,
  pub steps: Vec<CompiledStep>,
  pub metadata: PipelineMetadata,
  /// Compiled step id -> position in `steps`.
  registry: BTreeMap<String, usize>,
}

impl CompiledPipeline {
  pub(crate) fn new(
    workflow_id: String,
    name: String,
    input_validator: Validator,
    output_validator: Validator,
    steps: Vec<CompiledStep>,
    metadata: PipelineMetadata,
  ) -> Self {
    let registry = steps
      .iter()
      .enumerate()
      .map(|(position, step)| (step.id.clone(), position))
      .collect();

    Self {
      workflow_id,
      name,
      input_validator,
      output_validator,
      steps,
      metadata,
      registry,
    }
  }

  /// Look up a compiled step by its generated id.
  pub fn step(&self, compiled_id: &str) -> Option<&CompiledStep> {
    self
      .registry
      .get(compiled_id)
      .and_then(|&position| self.steps.get(position))
  }

  /// Look up a compiled step by its definition step id.
  pub fn step_for(&self, step_id: &str) -> Option<&CompiledStep> {
    self.steps.iter().find(|s| s.step_id == step_id)
  }

  /// Render the pipeline as human-reviewable text.
  pub fn render(&self) -> Result<String, minijinja::Error> {
    crate::render::render_pipeline(self)
  }
}

/// Everything a compile produces.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
  /// The pipeline. Withheld when the workflow-level control flow is not executable;
  /// partial when individual steps failed to compile.
  pub pipeline: Option<CompiledPipeline>,
  pub metadata: PipelineMetadata,
  pub errors: Vec<CompileError>,
}

impl CompileOutput {
  /// True when nothing went wrong.
  pub fn is_clean(&self) -> bool {
    self.errors.is_empty()
  }

  /// Errors as user-facing strings.
  pub fn error_messages(&self) -> Vec<String> {
    self.errors.iter().map(ToString::to_string).collect()
  }
}
