//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violated invariants of the exception tree.
/// They are library errors, never part of a modeled failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("second argument (exceptions) must be a non-empty sequence: {message:?}")]
    Empty { message: String },

    #[error("cannot nest {kind} in an ExceptionGroup: {message:?}")]
    NonRecoverableMember { message: String, kind: String },

    #[error("{kind} is a group kind and cannot be raised as a leaf")]
    GroupKindLeaf { kind: String },

    #[error("kind {name} must declare at least one parent")]
    MissingParent { name: String },

    #[error("kind {name} cannot derive from group kind {parent}")]
    GroupKindParent { name: String, parent: String },

    #[error("exception kind already declared: {0}")]
    DuplicateKind(String),

    #[error("unknown exception kind: {0}")]
    UnknownKind(String),
}

/// Result type for domain operations.
pub type GroupResult<T> = Result<T, GroupError>;
