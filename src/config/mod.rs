//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (endpoints, limits, probe windows, trigger timing)
//! - Output column header constants
//! - Library configuration types

mod constants;
mod headers;
mod types;

// Re-export all constants
pub use constants::*;
pub use headers::*;
pub use types::{Config, LogFormat, LogLevel, ProbeWindow};
