use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HostError;

/// Arguments for one external tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
  /// The step input, after mapping.
  pub arguments: Value,
  /// Account to act as. `None` for tools that need no authorization.
  pub authorized_account_id: Option<String>,
  pub caller_id: String,
}

/// What the tool collaborator reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
  pub successful: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ToolExecution {
  pub fn success(data: impl Into<Value>) -> Self {
    Self {
      successful: true,
      data: Some(data.into()),
      error: None,
    }
  }

  pub fn failure(error: impl Into<String>) -> Self {
    Self {
      successful: false,
      data: None,
      error: Some(error.into()),
    }
  }
}

/// Runs third-party tools on behalf of a caller.
///
/// A tool that ran but failed is reported as an unsuccessful
/// [`ToolExecution`]. `Err` is reserved for not reaching the collaborator.
/// Retries, if any, happen behind this trait.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
  async fn execute(
    &self,
    tool_id: &str,
    invocation: ToolInvocation,
  ) -> Result<ToolExecution, HostError>;
}
