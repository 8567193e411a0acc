//! Error types for maildirmerge

use thiserror::Error;

/// Main error type for maildirmerge
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{path}: multiple types matched ({labels}), not proceeding for safety")]
    AmbiguousType { path: String, labels: String },
}

/// Result type alias for maildirmerge
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error was raised before any filesystem work started.
    ///
    /// The driver exits with a usage hint for these.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Validation(_))
    }
}
