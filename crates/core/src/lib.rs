//! Core logic including the authorization-gated tool-call workflow, tool
//! catalogs, and the message log.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod auth;
mod backend;
pub mod conversation;
mod error;
mod model_client;
mod retry;
pub mod tool;
pub mod workflow;

pub use backend::{BackendError, BackendErrorKind};
pub use error::{Backend, Error};
pub use model_client::{CompletedTurn, ModelClient, TranscriptFn};
pub use retry::RetryPolicy;
pub use workflow::{Driver, DriverBuilder, Outcome, Stage, WorkflowState};
