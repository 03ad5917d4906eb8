//! Backup Error Types
//!
//! Callers receive one of a small closed set of kinds; the storage or metadata
//! error that caused it stays in the `exn` error tree for logging.

use derive_more::{Display, Error};
use savesync_metadata::error::Error as MetadataError;
use savesync_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};
use std::path::PathBuf;

/// A backup engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for backup engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The requested path resolves outside of the storage root
    #[display("path escapes storage root: {}", _0.display())]
    PathEscape(#[error(not(source))] PathBuf),
    /// The file to read does not exist or cannot be read
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The storage root could not be created or accessed
    #[display("storage root unavailable: {}", _0.display())]
    StorageInit(#[error(not(source))] PathBuf),
    /// Writing, copying or deleting bytes failed
    #[display("storage I/O failure")]
    Io,
    /// A backup id or file name that can never be stored
    #[display("invalid name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// The metadata index failed
    #[display("metadata index failure")]
    Metadata,
    /// The operation was cancelled before it completed
    #[display("operation cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Raise a storage error into the closest engine category, keeping the
    /// storage error as a child in the error tree.
    ///
    /// Permission errors are I/O failures here; [`read`](Self::storage_read)
    /// reports them as missing instead.
    #[track_caller]
    pub(crate) fn storage(err: StorageError) -> Error {
        let kind = match &*err {
            StorageErrorKind::PathEscape(path) => Self::PathEscape(path.clone()),
            StorageErrorKind::StorageInit(path) => Self::StorageInit(path.clone()),
            StorageErrorKind::NotFound(path) => Self::NotFound(path.clone()),
            StorageErrorKind::PermissionDenied(_) | StorageErrorKind::Io(_) | StorageErrorKind::BackendError(_) => {
                Self::Io
            },
        };
        err.raise(kind)
    }

    /// Same as [`storage`](Self::storage), but anything unreadable is missing.
    #[track_caller]
    pub(crate) fn storage_read(err: StorageError) -> Error {
        let kind = match &*err {
            StorageErrorKind::PathEscape(path) => Self::PathEscape(path.clone()),
            StorageErrorKind::StorageInit(path) => Self::StorageInit(path.clone()),
            StorageErrorKind::NotFound(path) | StorageErrorKind::PermissionDenied(path) => Self::NotFound(path.clone()),
            StorageErrorKind::Io(_) | StorageErrorKind::BackendError(_) => Self::Io,
        };
        err.raise(kind)
    }

    #[track_caller]
    pub(crate) fn metadata(err: MetadataError) -> Error {
        err.raise(Self::Metadata)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Metadata)
    }
}
