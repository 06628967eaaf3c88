/// A value that does not match its validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
  /// Location of the offending value, rooted at `$`.
  pub path: String,
  pub message: String,
}

impl SchemaError {
  pub(crate) fn new(path: &str, message: impl Into<String>) -> Self {
    Self {
      path: path.to_string(),
      message: message.into(),
    }
  }
}
