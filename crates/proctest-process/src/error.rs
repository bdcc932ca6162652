//! Error types for process execution

use std::io;

use thiserror::Error;

use crate::state::ProcessState;

/// Process execution errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The OS could not start the command. Never retried.
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Input stream already closed, or the handle is no longer running
    #[error("Input stream of `{label}` is closed")]
    InputClosed { label: String },

    /// Operation not valid in the handle's current state
    #[error("Cannot {op} `{label}` while it is {state}")]
    InvalidState {
        label: String,
        state: ProcessState,
        op: &'static str,
    },

    /// A before-spawn or after-spawn hook failed
    #[error("Lifecycle hook failed: {0}")]
    Hook(String),

    /// Signal delivery failed for a reason other than "no such process"
    #[error("Failed to signal process: {0}")]
    Signal(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProcessError {
    /// True for the "write to a closed input" condition
    pub fn is_input_closed(&self) -> bool {
        matches!(self, ProcessError::InputClosed { .. })
    }

    /// True when the command could not be launched at all
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, ProcessError::SpawnFailed { .. })
    }
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
