//! Engine error types.

use gatehouse_core::ParamType;
use gatehouse_storage::StorageError;
use thiserror::Error;

/// Errors raised by the registries and the gateway facade.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Category name is not in the trusted set.
    #[error("category not trusted: {0}")]
    UnknownCategory(String),

    /// Aggregate requested before its plain category was registered.
    #[error("original category not registered for aggregate: {0}")]
    OriginalCategoryNotRegistered(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("category not found: {0}")]
    CategoryNotFound(u32),

    /// `prepare` referenced a category id that was never assigned.
    #[error("unknown category id: {0}")]
    UnknownCategoryId(u32),

    #[error("descriptor not trusted")]
    UntrustedDescriptor,

    #[error("descriptor failed to compile: {0}")]
    ParseFailed(#[source] gatehouse_core::Error),

    #[error("unknown statement: {0}")]
    UnknownStatement(u32),

    #[error("statement {id} is a {kind} statement")]
    WrongStatementKind { id: u32, kind: &'static str },

    #[error(transparent)]
    IllegalPatch(#[from] PatchError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Parameters that do not fit a prepared statement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("expected {expected} parameters, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("parameter {index}: expected {expected}, got {actual}")]
    TypeMismatch {
        index: usize,
        expected: ParamType,
        actual: ParamType,
    },

    #[error("parameter {index}: LIMIT must not be negative")]
    NegativeLimit { index: usize },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
