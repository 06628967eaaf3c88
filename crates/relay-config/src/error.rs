use thiserror::Error;

/// A definition that does not match its declared shape.
///
/// Validation errors are fatal to a save, unlike compile errors which are
/// reported alongside the stored definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("workflow id must not be empty")]
  MissingWorkflowId,

  #[error("step at position {position} has an empty id")]
  EmptyStepId { position: usize },

  #[error("duplicate step id: {step_id}")]
  DuplicateStepId { step_id: String },
}
