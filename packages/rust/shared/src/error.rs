//! Error types for masterdoc.
//!
//! Library crates use [`MasterDocError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all masterdoc operations.
///
/// Every variant is fatal for a run: the pipeline aborts before any output
/// file is written. Non-fatal conditions are [`crate::RunWarning`]s.
#[derive(Debug, thiserror::Error)]
pub enum MasterDocError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Document and summary path lists cannot be paired one-to-one.
    #[error("input mismatch: {message}")]
    InputMismatch { message: String },

    /// A path does not fit the configured path schema.
    #[error("invalid article path {path:?}: {message}")]
    InvalidPath { path: String, message: String },

    /// An article document could not be opened or parsed.
    #[error("unreadable document {path:?}: {message}")]
    UnreadableDocument { path: PathBuf, message: String },

    /// A summary text file could not be read.
    #[error("unreadable summary {path:?}: {source}")]
    UnreadableSummary {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The composer was given nothing to merge.
    #[error("compose failure: {message}")]
    Compose { message: String },

    /// Malformed package or WordprocessingML content.
    #[error("document error: {message}")]
    Document { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid report, bad input list, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MasterDocError>;

impl MasterDocError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an input mismatch error.
    pub fn input_mismatch(msg: impl Into<String>) -> Self {
        Self::InputMismatch {
            message: msg.into(),
        }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a compose error.
    pub fn compose(msg: impl Into<String>) -> Self {
        Self::Compose {
            message: msg.into(),
        }
    }

    /// Create a document error from any displayable message.
    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
