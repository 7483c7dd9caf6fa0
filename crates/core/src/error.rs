//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("descriptor parse error at offset {offset}: {message}")]
    DescriptorParse { offset: usize, message: String },

    #[error("descriptor does not match category: {0}")]
    CategoryMismatch(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid category schema: {0}")]
    InvalidCategory(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::DescriptorParse {
            offset,
            message: message.into(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
