//! Error types for the line follower.

use thiserror::Error;

/// The main error type for follow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The target file did not exist or could not be stat'ed when following started.
    #[error("File not found or inaccessible: {path}")]
    NotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The reader process could not be created or its stdout could not be captured.
    #[error("Failed to spawn reader `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-EOF failure while reading the reader's output.
    #[error("Read error: {0}")]
    Read(#[from] std::io::Error),

    /// Rejected configuration values.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// A convenient Result type for follow operations.
pub type Result<T> = std::result::Result<T, Error>;
