//! Shared plumbing for the chasm control-socket tools: logging setup and
//! configuration types.

pub mod config;
pub mod logging;

pub use tracing;
