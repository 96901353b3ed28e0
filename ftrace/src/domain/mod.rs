//! Domain model for ftrace
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Structured error handling

pub mod errors;
pub mod types;

pub use types::{Pid, PointerWidth};

pub use errors::{ConfigError, ControlError, DecodeError, StreamError};
