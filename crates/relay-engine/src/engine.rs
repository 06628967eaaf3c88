//! Workflow execution engine.
//!
//! A run moves through `Idle -> Validating -> Running -> Completed | Failed`.
//! Validating resolves the caller's connections; a run with missing
//! connections fails without running any step. Running executes compiled steps
//! strictly in order and stops at the first failure.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::Stream;
use relay_compiler::{CompiledPipeline, CompiledStep, MapContext, StepProcedure};
use relay_host::{CodeRunner, PassthroughRecords, RecordsGateway, ToolExecutor};
use relay_resolver::{ConnectionBindings, ConnectionResolver};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::error::ExecutionError;
use crate::events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier};
use crate::step::StepTask;

/// Configuration for the workflow engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Check step outputs and the workflow output against their schemas.
  pub validate_outputs: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      validate_outputs: true,
    }
  }
}

/// A request to run a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
  /// Identity of the caller, as established by the auth layer.
  pub caller_id: String,
  pub input: Value,
}

impl RunRequest {
  pub fn new(caller_id: impl Into<String>, input: Value) -> Self {
    Self {
      caller_id: caller_id.into(),
      input,
    }
  }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
  pub execution_id: String,
  pub output: Value,
}

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Idle,
  Validating,
  Running,
  Completed,
  Failed,
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      RunState::Idle => "idle",
      RunState::Validating => "validating",
      RunState::Running => "running",
      RunState::Completed => "completed",
      RunState::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Per-run bookkeeping. Each run owns one; nothing here is shared.
struct Run<'a> {
  execution_id: String,
  request: RunRequest,
  notifier: &'a dyn ExecutionNotifier,
  state: RunState,
  outputs: HashMap<String, Value>,
}

impl Run<'_> {
  fn transition(&mut self, next: RunState) {
    debug!(
      execution_id = %self.execution_id,
      from = %self.state,
      to = %next,
      "run state changed"
    );
    self.state = next;
  }
}

/// The workflow execution engine.
///
/// Cheap to clone. One engine serves any number of concurrent runs; compiled
/// pipelines are shared read-only between them.
#[derive(Clone)]
pub struct WorkflowEngine {
  tools: Arc<dyn ToolExecutor>,
  resolver: Arc<dyn ConnectionResolver>,
  code: Arc<dyn CodeRunner>,
  records: Arc<dyn RecordsGateway>,
  config: EngineConfig,
}

impl WorkflowEngine {
  /// Create an engine. Records steps pass their input through unchanged
  /// until [`with_records`](Self::with_records) installs a gateway.
  pub fn new(
    tools: Arc<dyn ToolExecutor>,
    resolver: Arc<dyn ConnectionResolver>,
    code: Arc<dyn CodeRunner>,
  ) -> Self {
    Self {
      tools,
      resolver,
      code,
      records: Arc::new(PassthroughRecords),
      config: EngineConfig::default(),
    }
  }

  pub fn with_records(mut self, records: Arc<dyn RecordsGateway>) -> Self {
    self.records = records;
    self
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Run a pipeline, reporting progress to `notifier`.
  ///
  /// Exactly one terminal event is emitted, whether the run succeeds or not.
  #[instrument(
    name = "engine_execute",
    skip(self, pipeline, request, notifier),
    fields(workflow_id = %pipeline.workflow_id)
  )]
  pub async fn execute(
    &self,
    pipeline: &CompiledPipeline,
    request: RunRequest,
    notifier: &dyn ExecutionNotifier,
  ) -> Result<RunResult, ExecutionError> {
    let started = Instant::now();
    let mut run = Run {
      execution_id: uuid::Uuid::new_v4().to_string(),
      request,
      notifier,
      state: RunState::Idle,
      outputs: HashMap::new(),
    };

    info!(
      execution_id = %run.execution_id,
      workflow_id = %pipeline.workflow_id,
      caller_id = %run.request.caller_id,
      steps = pipeline.steps.len(),
      "workflow_started"
    );

    let result = self.drive(pipeline, &mut run).await;
    let total_ms = elapsed_ms(started);

    match result {
      Ok(output) => {
        run.transition(RunState::Completed);
        info!(
          execution_id = %run.execution_id,
          total_duration_ms = total_ms,
          "workflow_completed"
        );
        notifier.notify(ExecutionEvent::workflow_complete(output.clone(), total_ms));
        Ok(RunResult {
          execution_id: run.execution_id,
          output,
        })
      }
      Err(e) => {
        run.transition(RunState::Failed);
        error!(
          execution_id = %run.execution_id,
          failed_step_id = ?e.step_id(),
          error = %e,
          "workflow_failed"
        );
        notifier.notify(ExecutionEvent::workflow_error(&e, total_ms));
        Err(e)
      }
    }
  }

  /// Run a pipeline in the background and stream its events.
  ///
  /// The receiver yields every event of the run and then closes. The last
  /// event is always terminal, also when the run task panics. Must be called
  /// from within a tokio runtime.
  pub fn stream(
    &self,
    pipeline: Arc<CompiledPipeline>,
    request: RunRequest,
  ) -> mpsc::UnboundedReceiver<ExecutionEvent> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let notifier = Arc::new(TerminalGuard::new(ChannelNotifier::new(sender)));
    let engine = self.clone();

    tokio::spawn(async move {
      let started = Instant::now();
      let run_notifier = Arc::clone(&notifier);
      let run = tokio::spawn(async move {
        engine
          .execute(&pipeline, request, run_notifier.as_ref())
          .await
      });

      if let Err(e) = run.await
        && !notifier.terminated()
      {
        let error = ExecutionError::Transport {
          step_id: None,
          message: format!("run task failed: {}", e),
        };
        error!(error = %error, "workflow_failed");
        notifier.notify(ExecutionEvent::workflow_error(&error, elapsed_ms(started)));
      }
    });

    receiver
  }

  /// [`stream`](Self::stream) as a `futures` stream.
  pub fn events(
    &self,
    pipeline: Arc<CompiledPipeline>,
    request: RunRequest,
  ) -> impl Stream<Item = ExecutionEvent> + Send + 'static {
    let receiver = self.stream(pipeline, request);
    futures::stream::unfold(receiver, |mut receiver| async move {
      receiver.recv().await.map(|event| (event, receiver))
    })
  }

  /// Validating and Running. Returns the workflow output.
  async fn drive(
    &self,
    pipeline: &CompiledPipeline,
    run: &mut Run<'_>,
  ) -> Result<Value, ExecutionError> {
    run.transition(RunState::Validating);
    let resolution = self
      .resolver
      .resolve(&pipeline.metadata.required_connections, &run.request.caller_id)
      .await?;

    if !resolution.valid {
      return Err(ExecutionError::ConnectionMissing {
        missing: resolution.missing_connections,
        message: resolution.errors.join(" "),
      });
    }

    run.transition(RunState::Running);
    pipeline
      .input_validator
      .validate(&run.request.input)
      .map_err(|source| ExecutionError::InvalidInput {
        step_id: None,
        source,
      })?;

    let mut current = run.request.input.clone();
    for step in &pipeline.steps {
      current = self.run_step(step, current, &resolution.bindings, run).await?;
      run.outputs.insert(step.step_id.clone(), current.clone());
    }

    if self.config.validate_outputs {
      pipeline
        .output_validator
        .validate(&current)
        .map_err(|source| ExecutionError::InvalidOutput {
          step_id: None,
          source,
        })?;
    }

    Ok(current)
  }

  /// Run one step, emitting its start event and its complete or error event.
  async fn run_step(
    &self,
    step: &CompiledStep,
    previous: Value,
    bindings: &ConnectionBindings,
    run: &Run<'_>,
  ) -> Result<Value, ExecutionError> {
    let started = Instant::now();
    info!(
      execution_id = %run.execution_id,
      step_id = %step.step_id,
      kind = step.procedure.kind(),
      "step_started"
    );
    run
      .notifier
      .notify(ExecutionEvent::step_start(&step.step_id, &step.name));

    let result = self.invoke_step(step, previous, bindings, run).await;
    let duration_ms = elapsed_ms(started);

    match &result {
      Ok(output) => {
        info!(
          execution_id = %run.execution_id,
          step_id = %step.step_id,
          duration_ms,
          "step_completed"
        );
        run.notifier.notify(ExecutionEvent::step_complete(
          &step.step_id,
          output.clone(),
          duration_ms,
        ));
      }
      Err(e) => {
        error!(
          execution_id = %run.execution_id,
          step_id = %step.step_id,
          error = %e,
          "step_failed"
        );
        run
          .notifier
          .notify(ExecutionEvent::step_error(&step.step_id, e.to_string(), duration_ms));
      }
    }

    result
  }

  async fn invoke_step(
    &self,
    step: &CompiledStep,
    previous: Value,
    bindings: &ConnectionBindings,
    run: &Run<'_>,
  ) -> Result<Value, ExecutionError> {
    let input = match &step.mapper {
      Some(mapper) => mapper.apply(&MapContext {
        workflow_input: &run.request.input,
        step_outputs: &run.outputs,
      }),
      None => previous,
    };

    step
      .input_validator
      .validate(&input)
      .map_err(|source| ExecutionError::InvalidInput {
        step_id: Some(step.step_id.clone()),
        source,
      })?;

    let account_id = match &step.procedure {
      StepProcedure::ExternalTool {
        toolkit_slug,
        requires_auth: true,
        ..
      } => bindings.get(toolkit_slug).cloned(),
      _ => None,
    };

    let task = StepTask {
      step_id: step.step_id.clone(),
      procedure: step.procedure.clone(),
      input,
      caller_id: run.request.caller_id.clone(),
      account_id,
      tools: Arc::clone(&self.tools),
      code: Arc::clone(&self.code),
      records: Arc::clone(&self.records),
    };

    let output = tokio::spawn(task.run())
      .await
      .map_err(|e| ExecutionError::Transport {
        step_id: Some(step.step_id.clone()),
        message: format!("step task failed: {}", e),
      })??;

    if self.config.validate_outputs {
      step
        .output_validator
        .validate(&output)
        .map_err(|source| ExecutionError::InvalidOutput {
          step_id: Some(step.step_id.clone()),
          source,
        })?;
    }

    Ok(output)
  }
}

/// Forwards events and remembers whether a terminal one went through.
struct TerminalGuard<N> {
  inner: N,
  terminated: AtomicBool,
}

impl<N: ExecutionNotifier> TerminalGuard<N> {
  fn new(inner: N) -> Self {
    Self {
      inner,
      terminated: AtomicBool::new(false),
    }
  }

  fn terminated(&self) -> bool {
    self.terminated.load(Ordering::SeqCst)
  }
}

impl<N: ExecutionNotifier> ExecutionNotifier for TerminalGuard<N> {
  fn notify(&self, event: ExecutionEvent) {
    if event.is_terminal() && self.terminated.swap(true, Ordering::SeqCst) {
      return;
    }
    self.inner.notify(event);
  }
}

fn elapsed_ms(started: Instant) -> u64 {
  u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
