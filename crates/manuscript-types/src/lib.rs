//! Shared error, config, and utility types for the manuscript analysis
//! engine workspace.

pub mod common;
pub mod config;
pub mod error;
pub mod telemetry;

pub use common::*;
pub use config::*;
pub use error::{ManuscriptError, Result, SchedulerError};
pub use telemetry::{init_tracing, LogFormat};
