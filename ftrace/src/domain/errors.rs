//! Structured error types for ftrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;

use thiserror::Error;

use crate::probes::ParameterKind;

/// A token could not be converted to its declared kind
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot decode {text:?} as {kind}")]
pub struct DecodeError {
    pub kind: ParameterKind,
    pub text: String,
}

impl DecodeError {
    pub fn new(kind: ParameterKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }
}

/// Setup-time problems with descriptors or probe requests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Event {event} declares {params} parameters but only {registers} registers are available")]
    TooManyParameters { event: String, params: usize, registers: usize },

    #[error("Parameter kind {0} has no probe argument template")]
    NotProbeable(ParameterKind),

    #[error("Probe handle {0} is declared twice")]
    DuplicateHandle(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Pointer width must be 4 or 8 bytes, got {0}")]
    InvalidPointerWidth(u8),

    #[error("Event {0} has list parameters but a list length of 0")]
    ZeroListLength(String),
}

/// Failures while driving the tracefs control files
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read a flag from {path}: unexpected value {value:?}")]
    InvalidFlag { path: PathBuf, value: String },

    #[error("Cannot enable or disable {0}: probe is not registered")]
    NotRegistered(String),

    #[error("Cannot unregister {0} while it is enabled")]
    StillEnabled(String),

    #[error("Tracer is not set up")]
    NotSetUp,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures while pulling events from a line source
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to read trace line: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
