//! Compile error types.

/// A problem compiling one part of a workflow.
///
/// Compile errors are collected per step and never stop the rest of the
/// workflow from compiling. The affected step is left out of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
  /// A binding names a step that does not exist.
  #[error("step '{step_id}': field '{field}' references unknown step '{source_step_id}'")]
  UnknownSourceStep {
    step_id: String,
    field: String,
    source_step_id: String,
  },

  /// A binding reads from its own step.
  #[error("step '{step_id}': field '{field}' references its own output")]
  SelfReference { step_id: String, field: String },

  /// A binding reads from a step that does not run strictly earlier.
  #[error(
    "step '{step_id}': field '{field}' references step '{source_step_id}', which does not run before it"
  )]
  ForwardReference {
    step_id: String,
    field: String,
    source_step_id: String,
  },

  /// A binding reads from a control-flow step, which never produces output.
  #[error(
    "step '{step_id}': field '{field}' references control flow step '{source_step_id}', which never runs"
  )]
  ControlFlowSource {
    step_id: String,
    field: String,
    source_step_id: String,
  },

  /// A binding is missing the data its source type needs.
  #[error("step '{step_id}': field '{field}' binding is missing {missing}")]
  IncompleteBinding {
    step_id: String,
    field: String,
    missing: &'static str,
  },

  /// Bindings were declared for a step the workflow does not contain.
  #[error("bindings declared for unknown step '{step_id}'")]
  UnknownBindingTarget { step_id: String },

  /// A step lacks what its type needs to compile.
  #[error("step '{step_id}': {message}")]
  IncompleteStep { step_id: String, message: String },

  /// Branch, loop or parallel control flow.
  #[error("not yet supported: {}", kinds.join(", "))]
  UnsupportedControlFlow { kinds: Vec<String> },
}

impl CompileError {
  /// The step the error belongs to, if it belongs to one.
  pub fn step_id(&self) -> Option<&str> {
    match self {
      CompileError::UnknownSourceStep { step_id, .. }
      | CompileError::SelfReference { step_id, .. }
      | CompileError::ForwardReference { step_id, .. }
      | CompileError::ControlFlowSource { step_id, .. }
      | CompileError::IncompleteBinding { step_id, .. }
      | CompileError::UnknownBindingTarget { step_id }
      | CompileError::IncompleteStep { step_id, .. } => Some(step_id),
      CompileError::UnsupportedControlFlow { .. } => None,
    }
  }
}
