//! Relay Config
//!
//! This crate contains the serializable workflow definition types for relay.
//! These types represent workflows as the editor saves them, before they are
//! compiled into an executable pipeline.
//!
//! Definitions can be loaded from:
//! - JSON files (via the CLI)
//! - The workflow store (as JSON documents)
//!
//! The compiler takes a [`WorkflowDefinition`] plus its [`StepBindings`],
//! validates the definition shape, and produces a compiled pipeline.

mod binding;
mod error;
mod schema;
mod step;
mod workflow;

pub use binding::{FieldBinding, FieldBindings, SourceType, StepBindings};
pub use error::ValidationError;
pub use schema::TypeDescriptor;
pub use step::{RecordsOperation, StepType, ToolRef, WorkflowStep};
pub use workflow::{ControlFlow, WorkflowDefinition};
