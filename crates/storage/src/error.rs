//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist (or is not a regular file)
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied by the operating system
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid characters or resolves outside the storage root
    #[display("path escapes storage root: {}", _0.display())]
    PathEscape(#[error(not(source))] PathBuf),
    /// Storage root could not be created or accessed
    #[display("could not initialize storage root: {}", _0.display())]
    StorageInit(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::BackendError(_))
    }

    /// Map an I/O error about `path` onto the closest storage category.
    pub fn from_io(err: IoError, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory => Self::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind as IoKind;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::PathEscape(PathBuf::from("../etc")).to_string(), "path escapes storage root: ../etc");
        assert_eq!(ErrorKind::NotFound(PathBuf::from("1000/a.dat")).to_string(), "file not found: 1000/a.dat");
    }

    #[test]
    fn io_errors_are_classified() {
        let kind = ErrorKind::from_io(IoError::new(IoKind::NotFound, "gone"), "a");
        assert!(matches!(kind, ErrorKind::NotFound(_)));
        let kind = ErrorKind::from_io(IoError::new(IoKind::NotADirectory, "file in the way"), "a/b");
        assert!(matches!(kind, ErrorKind::NotFound(_)));
        let kind = ErrorKind::from_io(IoError::new(IoKind::PermissionDenied, "nope"), "a");
        assert!(matches!(kind, ErrorKind::PermissionDenied(_)));
        let kind = ErrorKind::from_io(IoError::other("disk full"), "a");
        assert!(matches!(kind, ErrorKind::Io(_)));
        assert!(kind.is_retryable());
    }
}
