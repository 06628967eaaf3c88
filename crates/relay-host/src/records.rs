use async_trait::async_trait;
use relay_config::RecordsOperation;
use serde_json::Value;

use crate::error::HostError;

/// The tables collaborator that `tableQuery` and `tableWrite` steps hand off to.
#[async_trait]
pub trait RecordsGateway: Send + Sync {
  async fn dispatch(
    &self,
    operation: RecordsOperation,
    table_id: Option<&str>,
    input: Value,
  ) -> Result<Value, HostError>;
}

/// Returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRecords;

#[async_trait]
impl RecordsGateway for PassthroughRecords {
  async fn dispatch(
    &self,
    _operation: RecordsOperation,
    _table_id: Option<&str>,
    input: Value,
  ) -> Result<Value, HostError> {
    Ok(input)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_passthrough_returns_input() {
    let input = json!({"row": {"name": "x"}});
    let output = PassthroughRecords
      .dispatch(RecordsOperation::Write, Some("contacts"), input.clone())
      .await
      .unwrap();
    assert_eq!(output, input);
  }
}
