//! Running the procedure of one compiled step.
//!
//! A [`StepTask`] owns everything the procedure needs so it can be moved
//! onto its own tokio task.

use std::sync::Arc;

use relay_compiler::StepProcedure;
use relay_host::{CodeRunner, RecordsGateway, ToolExecutor, ToolInvocation};
use serde_json::Value;
use tracing::debug;

use crate::error::ExecutionError;

pub(crate) struct StepTask {
  pub step_id: String,
  pub procedure: StepProcedure,
  pub input: Value,
  pub caller_id: String,
  /// Account for the step's toolkit, when it needs one.
  pub account_id: Option<String>,
  pub tools: Arc<dyn ToolExecutor>,
  pub code: Arc<dyn CodeRunner>,
  pub records: Arc<dyn RecordsGateway>,
}

impl StepTask {
  pub(crate) async fn run(self) -> Result<Value, ExecutionError> {
    let step_id = self.step_id;
    let failed = |message: String| ExecutionError::StepExecution {
      step_id: step_id.clone(),
      message,
    };

    match self.procedure {
      StepProcedure::ExternalTool {
        tool_id,
        requires_auth,
        toolkit_slug,
      } => {
        if requires_auth && self.account_id.is_none() {
          return Err(failed(format!(
            "no connected account for toolkit '{}'",
            toolkit_slug
          )));
        }

        debug!(step_id = %step_id, tool_id = %tool_id, "dispatching tool");
        let invocation = ToolInvocation {
          arguments: self.input,
          authorized_account_id: self.account_id,
          caller_id: self.caller_id,
        };
        let result = self
          .tools
          .execute(&tool_id, invocation)
          .await
          .map_err(|e| failed(e.to_string()))?;

        if !result.successful {
          return Err(failed(
            result
              .error
              .unwrap_or_else(|| format!("tool '{}' reported failure", tool_id)),
          ));
        }
        Ok(result.data.unwrap_or(Value::Null))
      }
      StepProcedure::CustomCode { source } => self
        .code
        .run(&source, self.input)
        .await
        .map_err(|e| failed(e.to_string())),
      StepProcedure::Records {
        operation,
        table_id,
      } => self
        .records
        .dispatch(operation, table_id.as_deref(), self.input)
        .await
        .map_err(|e| failed(e.to_string())),
    }
  }
}
