//! Relay Schema
//!
//! Translates the abstract [`TypeDescriptor`](relay_config::TypeDescriptor)
//! trees attached to workflows and steps into [`Validator`]s that check JSON
//! values at run time.
//!
//! Validators are plain data so a compiled pipeline can be persisted, and each
//! one renders to a short textual form for audit output:
//!
//! ```text
//! object({ title: string(), tone: enum(["formal", "casual"]).optional() })
//! ```

mod error;
mod ident;
mod validator;

pub use error::SchemaError;
pub use ident::{is_identifier, quote_key};
pub use validator::{Field, Validator, translate};
