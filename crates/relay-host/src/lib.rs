//! Relay Host
//!
//! The collaborators a run talks to, as traits the engine is generic over:
//!
//! - [`ToolExecutor`]: runs third-party tools for `externalTool` steps
//! - [`ConnectionDirectory`]: lists the accounts a caller has connected
//! - [`CodeRunner`]: runs inline code for `customCode` steps
//! - [`RecordsGateway`]: receives `tableQuery` and `tableWrite` steps
//!
//! HTTP adapters for the tool service live in [`http`].

mod code;
mod connections;
mod error;
pub mod http;
mod records;
mod tool;

pub use code::CodeRunner;
pub use connections::{
  ACTIVE_STATUS, ConnectedAccount, ConnectionDirectory, StaticConnectionDirectory,
};
pub use error::HostError;
pub use http::{HttpConnectionDirectory, HttpToolExecutor};
pub use records::{PassthroughRecords, RecordsGateway};
pub use tool::{ToolExecution, ToolExecutor, ToolInvocation};
