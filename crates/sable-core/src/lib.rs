//! sable-core: domain model for the Sable invocation layer.
//!
//! This crate holds everything that does not touch a subprocess: the
//! session/message model and its store, structured-output recovery, the
//! configuration schema, and the shared error type. The `sable-interaction`
//! crate builds the subprocess orchestration on top of these types.

pub mod config;
pub mod error;
pub mod extract;
pub mod session;

// Re-export common error type
pub use error::{Result, SableError};
