use relay_resolver::ResolveError;
use relay_schema::SchemaError;
use thiserror::Error;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// The caller has no active account for some required toolkits.
  #[error("{message}")]
  ConnectionMissing {
    missing: Vec<String>,
    message: String,
  },

  /// The workflow input, or a step's input, does not match its schema.
  #[error("invalid input: {source}")]
  InvalidInput {
    step_id: Option<String>,
    #[source]
    source: SchemaError,
  },

  /// A step's output, or the workflow output, does not match its schema.
  #[error("invalid output: {source}")]
  InvalidOutput {
    step_id: Option<String>,
    #[source]
    source: SchemaError,
  },

  /// A step ran and failed.
  #[error("step '{step_id}' failed: {message}")]
  StepExecution { step_id: String, message: String },

  /// Connections could not be resolved.
  #[error("connection resolution failed: {0}")]
  Resolution(#[from] ResolveError),

  /// Anything unexpected, such as a panicking step task.
  #[error("transport error: {message}")]
  Transport {
    step_id: Option<String>,
    message: String,
  },
}

impl ExecutionError {
  /// The step the run failed in, if it failed in one.
  pub fn step_id(&self) -> Option<&str> {
    match self {
      ExecutionError::InvalidInput { step_id, .. }
      | ExecutionError::InvalidOutput { step_id, .. }
      | ExecutionError::Transport { step_id, .. } => step_id.as_deref(),
      ExecutionError::StepExecution { step_id, .. } => Some(step_id),
      ExecutionError::ConnectionMissing { .. } | ExecutionError::Resolution(_) => None,
    }
  }

  pub fn missing_connections(&self) -> &[String] {
    match self {
      ExecutionError::ConnectionMissing { missing, .. } => missing,
      _ => &[],
    }
  }
}
