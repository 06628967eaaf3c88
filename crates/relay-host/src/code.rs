use async_trait::async_trait;
use serde_json::Value;

use crate::error::HostError;

/// Runs caller-authored code for `customCode` steps.
///
/// The source is run as written with the step input bound as `input`; its
/// result becomes the step output. Implementations apply no sandboxing or
/// resource limits.
#[async_trait]
pub trait CodeRunner: Send + Sync {
  async fn run(&self, source: &str, input: Value) -> Result<Value, HostError>;
}
