//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for the byte side of backup storage. The filesystem backend is
//! the real thing; the in-memory backend exists for tests that need to
//! inject failures.
//!

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root. Implementations must run every
/// path through their [`PathResolver`](crate::PathResolver) (or, for
/// non-filesystem backends, [`normalize_path`](crate::normalize_path)) and
/// reject anything that escapes with
/// [`PathEscape`](crate::error::ErrorKind::PathEscape) before touching storage.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use savesync_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_save(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("1000/save1.dat");
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream metadata for every regular file, optionally restricted to
    /// paths starting with `prefix` (component-wise).
    ///
    /// A prefix that doesn't exist yields an empty stream, not an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::Path;
    /// # use savesync_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(Some(Path::new("1000")));
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file or directory exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the path
    /// does not exist or is not a regular file.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Read file contents to completion.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the path
    /// does not exist or is not a regular file.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents, returning the number of bytes written.
    ///
    /// Creates parent directories as needed and overwrites whatever was at
    /// `path` before (last writer wins).
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use savesync_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let written = backend.write(Path::new("1000/save1.dat"), b"0123456789").await?;
    /// assert_eq!(written, 10);
    /// # Ok(())
    /// # }
    /// ```
    async fn write(&self, path: &Path, data: &[u8]) -> Result<u64>;

    /// Delete a single file.
    ///
    /// Returns `false` when there was nothing to delete; absence is not an
    /// error.
    async fn remove_file(&self, path: &Path) -> Result<bool>;

    /// Recursively delete a directory and everything underneath it.
    ///
    /// A missing directory is not an error. The storage root itself is never
    /// a valid target (see [`clear`](Self::clear)).
    async fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete everything underneath the storage root, keeping the root.
    async fn clear(&self) -> Result<()>;
}
