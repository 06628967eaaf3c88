use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Status the directory reports for usable accounts.
pub const ACTIVE_STATUS: &str = "ACTIVE";

/// An account a caller has connected for a toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccount {
  pub toolkit_slug: String,
  pub status: String,
  pub account_id: String,
}

impl ConnectedAccount {
  pub fn new(
    toolkit_slug: impl Into<String>,
    status: impl Into<String>,
    account_id: impl Into<String>,
  ) -> Self {
    Self {
      toolkit_slug: toolkit_slug.into(),
      status: status.into(),
      account_id: account_id.into(),
    }
  }

  /// An active account for `toolkit_slug`.
  pub fn active(toolkit_slug: impl Into<String>, account_id: impl Into<String>) -> Self {
    Self::new(toolkit_slug, ACTIVE_STATUS, account_id)
  }

  pub fn is_active(&self) -> bool {
    self.status.eq_ignore_ascii_case(ACTIVE_STATUS)
  }
}

/// Lists the accounts a caller has connected.
#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
  async fn list(&self, caller_id: &str) -> Result<Vec<ConnectedAccount>, HostError>;
}

/// A fixed set of accounts per caller.
#[derive(Debug, Default)]
pub struct StaticConnectionDirectory {
  accounts: HashMap<String, Vec<ConnectedAccount>>,
  calls: AtomicUsize,
}

impl StaticConnectionDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add accounts for a caller.
  pub fn with_accounts(
    mut self,
    caller_id: impl Into<String>,
    accounts: impl IntoIterator<Item = ConnectedAccount>,
  ) -> Self {
    self
      .accounts
      .entry(caller_id.into())
      .or_default()
      .extend(accounts);
    self
  }

  /// How many times the directory has been listed.
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ConnectionDirectory for StaticConnectionDirectory {
  async fn list(&self, caller_id: &str) -> Result<Vec<ConnectedAccount>, HostError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.accounts.get(caller_id).cloned().unwrap_or_default())
  }
}
