//! Execution events and notifiers.
//!
//! Events are emitted as a run progresses so callers can stream them to a
//! UI. Every run ends with exactly one terminal event, either
//! `workflow-complete` or `workflow-error`.
//!
//! On the wire an event is a JSON object tagged by `type`:
//!
//! ```json
//! { "type": "step-complete", "stepId": "fetchPage", "output": {}, "durationMs": 12, "timestamp": "..." }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ExecutionError;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ExecutionEvent {
  StepStart {
    step_id: String,
    step_name: String,
    timestamp: DateTime<Utc>,
  },

  StepComplete {
    step_id: String,
    output: Value,
    duration_ms: u64,
    timestamp: DateTime<Utc>,
  },

  StepError {
    step_id: String,
    error: String,
    duration_ms: u64,
    timestamp: DateTime<Utc>,
  },

  WorkflowComplete {
    output: Value,
    total_duration_ms: u64,
    timestamp: DateTime<Utc>,
  },

  WorkflowError {
    error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failed_step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    missing_connections: Vec<String>,
    total_duration_ms: u64,
    timestamp: DateTime<Utc>,
  },
}

impl ExecutionEvent {
  pub fn step_start(step_id: impl Into<String>, step_name: impl Into<String>) -> Self {
    ExecutionEvent::StepStart {
      step_id: step_id.into(),
      step_name: step_name.into(),
      timestamp: Utc::now(),
    }
  }

  pub fn step_complete(step_id: impl Into<String>, output: Value, duration_ms: u64) -> Self {
    ExecutionEvent::StepComplete {
      step_id: step_id.into(),
      output,
      duration_ms,
      timestamp: Utc::now(),
    }
  }

  pub fn step_error(step_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
    ExecutionEvent::StepError {
      step_id: step_id.into(),
      error: error.into(),
      duration_ms,
      timestamp: Utc::now(),
    }
  }

  pub fn workflow_complete(output: Value, total_duration_ms: u64) -> Self {
    ExecutionEvent::WorkflowComplete {
      output,
      total_duration_ms,
      timestamp: Utc::now(),
    }
  }

  /// The terminal event for a failed run.
  pub fn workflow_error(error: &ExecutionError, total_duration_ms: u64) -> Self {
    ExecutionEvent::WorkflowError {
      error: error.to_string(),
      failed_step_id: error.step_id().map(str::to_string),
      missing_connections: error.missing_connections().to_vec(),
      total_duration_ms,
      timestamp: Utc::now(),
    }
  }

  /// The `type` tag of the event.
  pub fn kind(&self) -> &'static str {
    match self {
      ExecutionEvent::StepStart { .. } => "step-start",
      ExecutionEvent::StepComplete { .. } => "step-complete",
      ExecutionEvent::StepError { .. } => "step-error",
      ExecutionEvent::WorkflowComplete { .. } => "workflow-complete",
      ExecutionEvent::WorkflowError { .. } => "workflow-error",
    }
  }

  pub fn step_id(&self) -> Option<&str> {
    match self {
      ExecutionEvent::StepStart { step_id, .. }
      | ExecutionEvent::StepComplete { step_id, .. }
      | ExecutionEvent::StepError { step_id, .. } => Some(step_id),
      ExecutionEvent::WorkflowComplete { .. } | ExecutionEvent::WorkflowError { .. } => None,
    }
  }

  pub fn timestamp(&self) -> DateTime<Utc> {
    match self {
      ExecutionEvent::StepStart { timestamp, .. }
      | ExecutionEvent::StepComplete { timestamp, .. }
      | ExecutionEvent::StepError { timestamp, .. }
      | ExecutionEvent::WorkflowComplete { timestamp, .. }
      | ExecutionEvent::WorkflowError { timestamp, .. } => *timestamp,
    }
  }

  /// True for `workflow-complete` and `workflow-error`.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      ExecutionEvent::WorkflowComplete { .. } | ExecutionEvent::WorkflowError { .. }
    )
  }
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event as soon as it happens.
/// Implementations decide what to do with them (stream, persist, ignore).
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// The engine never waits on a slow consumer. Event volume is two per step
/// plus one terminal event.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
