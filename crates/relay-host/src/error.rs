use thiserror::Error;

/// Errors talking to a run collaborator.
#[derive(Debug, Error)]
pub enum HostError {
  /// The collaborator endpoint could not be parsed or extended.
  #[error("invalid endpoint '{url}': {message}")]
  InvalidEndpoint { url: String, message: String },

  /// The request never produced a response.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The collaborator answered with a non-success status.
  #[error("{url} returned {status}: {body}")]
  Status {
    url: String,
    status: u16,
    body: String,
  },

  /// The response body did not have the expected shape.
  #[error("invalid response from {url}: {message}")]
  Decode { url: String, message: String },

  /// Inline code failed to run.
  #[error("code error: {message}")]
  Code { message: String },

  /// The records collaborator rejected the request.
  #[error("records error: {message}")]
  Records { message: String },
}
