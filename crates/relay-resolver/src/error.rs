use thiserror::Error;

/// Errors that can occur during connection resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// The connection directory could not be listed.
  #[error("failed to list connections for '{caller_id}': {source}")]
  Directory {
    caller_id: String,
    #[source]
    source: relay_host::HostError,
  },
}
