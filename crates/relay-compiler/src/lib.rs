//! Relay Compiler
//!
//! Turns a [`WorkflowDefinition`] plus its [`StepBindings`] into a
//! [`CompiledPipeline`]: an ordered list of typed steps, each with the mapper
//! that builds its input and the procedure the engine runs for it.
//!
//! Compilation is pure. The same definition and bindings always produce the
//! same pipeline, metadata and errors. Problems in individual steps are
//! collected as [`CompileError`]s and the rest of the workflow still compiles;
//! only a malformed definition ([`ValidationError`]) stops compilation.
//!
//! ```text
//! definition ──► validate ──► order by listIndex ──► compile steps ──► pipeline
//!                                     │                  │
//!                                     └─ controlFlow ────┴─► errors
//! ```

mod binding;
mod cache;
mod composer;
mod error;
mod pipeline;
mod render;
mod step;

pub use binding::{FieldMapping, MapContext, MappedSource, Mapper, lookup_path};
pub use cache::PipelineCache;
pub use error::CompileError;
pub use pipeline::{CompileOutput, CompiledPipeline, CompiledStep, PipelineMetadata, StepProcedure};
pub use step::compiled_id;

use relay_config::{StepBindings, ValidationError, WorkflowDefinition};
use tracing::{info, instrument};

/// Compile a workflow definition with its bindings.
#[instrument(
  name = "compile",
  skip(definition, bindings),
  fields(workflow_id = %definition.id, steps = definition.steps.len())
)]
pub fn compile(
  definition: &WorkflowDefinition,
  bindings: &StepBindings,
) -> Result<CompileOutput, ValidationError> {
  definition.validate()?;

  let output = composer::compose(definition, bindings);

  info!(
    event = "workflow_compiled",
    compiled_steps = output.pipeline.as_ref().map(|p| p.steps.len()).unwrap_or(0),
    errors = output.errors.len(),
    required_connections = output.metadata.required_connections.len(),
    "compiled workflow"
  );

  Ok(output)
}
