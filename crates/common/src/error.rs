//! Error types for erpmind.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErpError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ErpError>;

/// Raised by an operation invocation.
///
/// Binding problems carry the parameter name so the failure message can
/// point at it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{0}' could not be resolved")]
    Unresolved(String),

    #[error("invalid value for '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

impl OperationError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Name of the parameter at fault, if the error is about one.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::MissingArgument(name) | Self::Unresolved(name) => Some(name),
            Self::InvalidArgument { name, .. } => Some(name),
            Self::Failed(_) => None,
        }
    }
}
