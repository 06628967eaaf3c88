use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use relay_host::ConnectionDirectory;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::ResolveError;

/// Toolkit slug -> authorized account id.
pub type ConnectionBindings = BTreeMap<String, String>;

/// Outcome of matching required toolkits to a caller's accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResolution {
  /// No required toolkit is missing.
  pub valid: bool,
  /// One human-readable summary when something is missing.
  pub errors: Vec<String>,
  pub missing_connections: Vec<String>,
  /// Accounts found so far, also when the resolution is not valid.
  pub bindings: ConnectionBindings,
}

impl ConnectionResolution {
  fn from_parts(bindings: ConnectionBindings, missing: Vec<String>) -> Self {
    let errors = summarize(&missing).into_iter().collect();
    Self {
      valid: missing.is_empty(),
      errors,
      missing_connections: missing,
      bindings,
    }
  }

  pub fn account_for(&self, toolkit_slug: &str) -> Option<&str> {
    self.bindings.get(toolkit_slug).map(String::as_str)
  }
}

/// Resolves the accounts a run will act as.
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
  /// Find an active account for every toolkit in `required`.
  ///
  /// Missing accounts are reported in the resolution, not as an error.
  /// `Err` means the directory itself could not be listed.
  async fn resolve(
    &self,
    required: &BTreeSet<String>,
    caller_id: &str,
  ) -> Result<ConnectionResolution, ResolveError>;
}

/// Standard resolver implementation that uses a connection directory.
pub struct StandardResolver<D: ConnectionDirectory> {
  directory: D,
}

impl<D: ConnectionDirectory> StandardResolver<D> {
  /// Create a new resolver with the given connection directory.
  pub fn new(directory: D) -> Self {
    Self { directory }
  }

  pub fn directory(&self) -> &D {
    &self.directory
  }
}

#[async_trait]
impl<D: ConnectionDirectory> ConnectionResolver for StandardResolver<D> {
  #[instrument(name = "resolve_connections", skip(self, required), fields(required = required.len()))]
  async fn resolve(
    &self,
    required: &BTreeSet<String>,
    caller_id: &str,
  ) -> Result<ConnectionResolution, ResolveError> {
    if required.is_empty() {
      return Ok(ConnectionResolution::from_parts(
        ConnectionBindings::new(),
        Vec::new(),
      ));
    }

    let accounts =
      self
        .directory
        .list(caller_id)
        .await
        .map_err(|source| ResolveError::Directory {
          caller_id: caller_id.to_string(),
          source,
        })?;
    debug!(accounts = accounts.len(), "listed connected accounts");

    let mut bindings = ConnectionBindings::new();
    let mut missing = Vec::new();

    for toolkit in required {
      let account = accounts
        .iter()
        .find(|a| a.toolkit_slug == *toolkit && a.is_active());

      match account {
        Some(account) => {
          bindings.insert(toolkit.clone(), account.account_id.clone());
        }
        None => missing.push(toolkit.clone()),
      }
    }

    if !missing.is_empty() {
      info!(
        event = "connections_missing",
        caller_id = %caller_id,
        missing = ?missing,
        "caller is missing required connections"
      );
    }

    Ok(ConnectionResolution::from_parts(bindings, missing))
  }
}

/// The user-facing summary for a set of missing toolkits.
fn summarize(missing: &[String]) -> Option<String> {
  match missing {
    [] => None,
    [toolkit] => Some(format!(
      "Missing required connection: {}. Connect this account to run the workflow.",
      toolkit
    )),
    toolkits => Some(format!(
      "Missing required connections: {}. Connect these accounts to run the workflow.",
      toolkits.join(", ")
    )),
  }
}
