//! Observability support
//!
//! Structured logging setup for applications embedding the client.

pub mod logging;

pub use logging::{init_logging, init_logging_from_env, LogFormat};
