//! Workflow composition.
//!
//! Orders steps by `listIndex`, drops control-flow steps, compiles the rest and
//! assembles them into one [`CompiledPipeline`] with its metadata.

use std::collections::{BTreeSet, HashMap};

use relay_config::{StepBindings, StepType, WorkflowDefinition, WorkflowStep};
use relay_schema::translate;
use tracing::{debug, warn};

use crate::error::CompileError;
use crate::pipeline::{CompileOutput, CompiledPipeline, CompiledStep, PipelineMetadata, StepProcedure};
use crate::step::compile_step;

/// Compose a pipeline from an already validated definition.
pub(crate) fn compose(definition: &WorkflowDefinition, bindings: &StepBindings) -> CompileOutput {
  let ordered = definition.ordered_steps();
  let by_id: HashMap<&str, &WorkflowStep> = definition
    .steps
    .iter()
    .map(|step| (step.id.as_str(), step))
    .collect();

  let mut errors: Vec<CompileError> = bindings
    .keys()
    .filter(|step_id| !by_id.contains_key(step_id.as_str()))
    .map(|step_id| CompileError::UnknownBindingTarget {
      step_id: step_id.clone(),
    })
    .collect();

  let mut unsupported = BTreeSet::new();
  if !definition.control_flow.is_sequential() {
    unsupported.insert(definition.control_flow.kind.clone());
  }

  let mut compiled = Vec::with_capacity(ordered.len());
  for (position, step) in ordered.iter().enumerate() {
    if step.step_type == StepType::ControlFlow {
      debug!(step_id = %step.id, kind = %step.control_kind(), "skipping control flow step");
      unsupported.insert(step.control_kind().to_string());
      continue;
    }

    match compile_step(step, position, bindings.get(&step.id), &by_id) {
      Ok(step) => compiled.push(step),
      Err(mut step_errors) => {
        warn!(
          step_id = %step.id,
          errors = step_errors.len(),
          "step left out of pipeline"
        );
        errors.append(&mut step_errors);
      }
    }
  }

  if !unsupported.is_empty() {
    errors.push(CompileError::UnsupportedControlFlow {
      kinds: unsupported.into_iter().collect(),
    });
  }

  let metadata = PipelineMetadata {
    required_connections: required_connections(&compiled),
    step_count: definition.steps.len(),
  };

  let pipeline = definition.control_flow.is_sequential().then(|| {
    CompiledPipeline::new(
      definition.id.clone(),
      definition.name.clone(),
      translate(definition.input_schema.as_ref()),
      translate(definition.output_schema.as_ref()),
      compiled,
      metadata.clone(),
    )
  });

  CompileOutput {
    pipeline,
    metadata,
    errors,
  }
}

/// Distinct toolkits of compiled external tool steps that need an account.
fn required_connections(steps: &[CompiledStep]) -> BTreeSet<String> {
  steps
    .iter()
    .filter_map(|step| match &step.procedure {
      StepProcedure::ExternalTool {
        toolkit_slug,
        requires_auth: true,
        ..
      } => Some(toolkit_slug.clone()),
      _ => None,
    })
    .collect()
}
