use relay_config::ValidationError;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The requested workflow was not found.
  #[error("workflow not found: {0}")]
  NotFound(String),

  /// The workflow id cannot be used as a storage key.
  #[error("invalid workflow id '{0}'")]
  InvalidId(String),

  /// The definition is malformed and was not saved.
  #[error("invalid workflow definition: {0}")]
  Validation(#[from] ValidationError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}
