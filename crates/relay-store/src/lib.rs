//! Relay Store
//!
//! This crate provides workflow storage and the save lifecycle around it.
//!
//! The [`WorkflowStore`] trait persists a definition together with the
//! pipeline compiled from it. Implementations:
//! - [`MemoryWorkflowStore`]: in-process, for tests and one-off runs
//! - [`FsWorkflowStore`]: one directory per workflow under a data dir
//! - [`SqliteWorkflowStore`]: a single SQLite table
//!
//! [`WorkflowService`] compiles on every save and keeps the
//! [`PipelineCache`](relay_compiler::PipelineCache) in step with the store.

mod error;
mod fs_store;
mod memory;
mod service;
mod sqlite;
mod store;
mod types;

pub use error::StoreError;
pub use fs_store::FsWorkflowStore;
pub use memory::MemoryWorkflowStore;
pub use service::{SaveOutcome, WorkflowService};
pub use sqlite::SqliteWorkflowStore;
pub use store::WorkflowStore;
pub use types::{StoredWorkflow, WorkflowSummary};
