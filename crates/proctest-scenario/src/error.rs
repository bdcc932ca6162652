//! Error types for scenarios and the process registry

use proctest_process::{ProcessError, ProcessState};
use thiserror::Error;

use crate::verdict::CompletionError;

/// Scenario and registry errors
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// No registered handle carries this label
    #[error("No process registered under label `{0}`")]
    NotFound(String),

    /// "last" asked of an empty registry
    #[error("No process has been registered yet")]
    Empty,

    /// The handle has not produced an exit status
    #[error("Process `{label}` has no exit status (it is {state})")]
    NoExitStatus { label: String, state: ProcessState },

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Completion(#[from] CompletionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScenarioError {
    /// Label lookup or "last" found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScenarioError::NotFound(_) | ScenarioError::Empty)
    }
}

impl From<config::ConfigError> for ScenarioError {
    fn from(e: config::ConfigError) -> Self {
        ScenarioError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for ScenarioError {
    fn from(e: toml::de::Error) -> Self {
        ScenarioError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for ScenarioError {
    fn from(e: toml::ser::Error) -> Self {
        ScenarioError::Config(e.to_string())
    }
}

/// Result type for scenario operations
pub type Result<T> = std::result::Result<T, ScenarioError>;
