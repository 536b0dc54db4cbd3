//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::GroupError;

/// Configuration errors of the selective-catch dispatcher.
///
/// Raised when `catch` is constructed, before any failure is handled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatchError {
    #[error("catching {kind} with catch() is not allowed, handle the group directly instead")]
    GroupKind { kind: String },

    #[error("handler #{index} is registered for an empty set of kinds")]
    EmptyTypeSet { index: usize },
}

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] GroupError),

    #[error("{0}")]
    Catch(#[from] CatchError),

    #[error("invalid scenario {path}: {message}")]
    Scenario { path: PathBuf, message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
