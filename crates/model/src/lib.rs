//! An abstraction layer for different LLMs.
//!
//! This crate establishes an unified protocol for the workflow to interact
//! with various supported LLMs, so that the driver can seamlessly switch
//! between them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
