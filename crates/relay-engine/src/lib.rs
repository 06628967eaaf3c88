//! Relay Execution Engine
//!
//! Runs a [`CompiledPipeline`](relay_compiler::CompiledPipeline) against
//! concrete input and reports progress as [`ExecutionEvent`]s.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine                         │
//! │  - execute(pipeline, request, notifier) → RunResult         │
//! │  - stream(pipeline, request) → event receiver               │
//! └─────────────────────────────────────────────────────────────┘
//!            │ Validating                     │ Running
//!            ▼                                ▼
//! ┌───────────────────────┐   ┌─────────────────────────────────┐
//! │  ConnectionResolver   │   │ per step: map → validate →      │
//! │  caller → accounts    │   │ spawn procedure → validate      │
//! └───────────────────────┘   └─────────────────────────────────┘
//!                                             │
//!                                             ▼
//!                       ToolExecutor / CodeRunner / RecordsGateway
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = WorkflowEngine::new(tools, resolver, Arc::new(LuaCodeRunner));
//!
//! let mut events = engine.stream(pipeline, RunRequest::new("user_1", json!({"email": "a@b.com"})));
//! while let Some(event) = events.recv().await {
//!   println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

mod engine;
mod error;
mod events;
mod step;

pub use engine::{EngineConfig, RunRequest, RunResult, RunState, WorkflowEngine};
pub use error::ExecutionError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
