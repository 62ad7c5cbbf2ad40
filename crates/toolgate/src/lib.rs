//! An out-of-the-box assistant that combines a chat model with remote tools
//! gated by per-user authorization.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the assistant into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod prompt;
mod session;
pub mod tools;

pub use config::{Config, ConfigError};
pub use prompt::system_prompt;
pub use session::{Reply, Session, SessionBuilder};

/// Re-exports of [`toolgate_core`] crate.
pub mod core {
    pub use toolgate_core::*;
}
