//! Error types for mergefs

use thiserror::Error;

use crate::guard::ALLOWED_OPERATIONS;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for merged-view operations
#[derive(Debug, Error)]
pub enum Error {
    /// A layer descriptor could not be resolved to a usable root directory
    #[error("invalid layer: {0}")]
    InvalidLayer(String),

    /// A disallowed primitive was invoked through the guarded filesystem
    #[error(
        "operation {operation} is not allowed through the guarded filesystem; \
         allowed operations are {}",
        ALLOWED_OPERATIONS.join(", ")
    )]
    ForbiddenOperation {
        /// Name of the attempted operation
        operation: String,
    },

    /// An argument of the wrong path kind was supplied
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying filesystem error, passed through verbatim
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True if this wraps a native not-found error from the filesystem
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
