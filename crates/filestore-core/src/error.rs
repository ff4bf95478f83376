//! Error types for filestore backends

use thiserror::Error;

/// Result type alias using the filestore Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by all backends
#[derive(Error, Debug)]
pub enum Error {
    /// The upload source could not be fully read, or the copy into the
    /// destination failed part way through.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The destination could not be created, written or accepted.
    #[error("Backend error: {message}")]
    Backend { message: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Storage backend not available: {backend}")]
    BackendUnavailable { backend: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for building a [`Error::Backend`]
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
        }
    }

    /// Returns true if the source stream was at fault
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Returns true if the destination rejected the operation
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
