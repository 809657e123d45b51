//! Error types for examsubmit.
//!
//! Library crates use [`ExamSubmitError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Note that a rejected submission is *not* an error: rejections are
//! ordinary values ([`crate::RejectReason`]). This type covers failures of
//! the machinery itself (unreadable config, broken audit log, ...).

use std::path::PathBuf;

/// Top-level error type for all examsubmit operations.
#[derive(Debug, thiserror::Error)]
pub enum ExamSubmitError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Audit log or submissions directory error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Document text extraction error.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// A value that cannot be written faithfully (e.g. an unloggable record).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ExamSubmitError>;

impl ExamSubmitError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Whether this error is an I/O error of kind `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
