//! Shared types for the multi-profile application scheduler
//!
//! Identifiers, outcomes, run configuration and tracing helpers used by the
//! orchestrator library and binary.

pub mod config;
pub mod errors;
pub mod logging;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
