//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::normalize as normalize_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Directories are
/// implicit: a directory "exists" while at least one file lives under it.
///
/// Prefixes registered with [`deny`](Self::deny) make every mutating call
/// underneath them fail with
/// [`PermissionDenied`](crate::error::ErrorKind::PermissionDenied), which is
/// how tests exercise the failure paths of the engine.
///
/// # Examples
///
/// ```
/// use savesync_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("1000/save1.dat", b"0123456789"),
/// ]);
/// assert!(backend.exists(Path::new("1000/save1.dat")).await?);
/// assert!(backend.exists(Path::new("1000")).await?);
///
/// backend.write(Path::new("1000/save2.dat"), b"data...").await?;
/// assert!(backend.exists(Path::new("1000/save2.dat")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, (UtcDateTime, Vec<u8>)>>,
    denied: Vec<PathBuf>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = normalize_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            denied: Vec::new(),
        }
    }

    /// Refuse writes and deletes underneath `prefix`.
    ///
    /// Panics on an invalid prefix, same as [`with_files`](Self::with_files).
    pub fn deny(mut self, prefix: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        let Ok(validated) = normalize_path(&prefix) else {
            panic!("MockBackend::deny: invalid path {}", prefix.display());
        };
        self.denied.push(validated);
        self
    }

    /// Validate a path that must name a file (or directory), never the root.
    fn validate(path: &Path) -> Result<PathBuf> {
        let validated = normalize_path(path)?;
        if validated.as_os_str().is_empty() {
            exn::bail!(ErrorKind::PathEscape(path.to_path_buf()));
        }
        Ok(validated)
    }

    fn check_allowed(&self, path: &Path) -> Result<()> {
        if self.denied.iter().any(|denied| path.starts_with(denied)) {
            exn::bail!(ErrorKind::PermissionDenied(path.to_path_buf()));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(normalize_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<(PathBuf, UtcDateTime, u64)> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, (inserted, data))| (path.clone(), *inserted, data.len() as u64))
                    .collect()
            };
            for (path, inserted, size) in entries {
                yield Ok(FileInfo::new(path, size, inserted));
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = normalize_path(path)?;
        Ok(self.storage.read().await.keys().any(|key| key.starts_with(&path)))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = Self::validate(path)?;
        let guard = self.storage.read().await;
        let (inserted, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileInfo::new(path.clone(), data.len() as u64, *inserted))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = Self::validate(path)?;
        let (_inserted, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<u64> {
        let path = Self::validate(path)?;
        self.check_allowed(&path)?;
        self.storage.write().await.insert(path, (UtcDateTime::now(), data.to_vec()));
        Ok(data.len() as u64)
    }

    async fn remove_file(&self, path: &Path) -> Result<bool> {
        let path = Self::validate(path)?;
        self.check_allowed(&path)?;
        Ok(self.storage.write().await.remove(&path).is_some())
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let path = Self::validate(path)?;
        self.check_allowed(&path)?;
        self.storage.write().await.retain(|key, _| !key.starts_with(&path));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.storage.write().await;
        if let Some(denied) = guard.keys().find(|key| self.check_allowed(key).is_err()) {
            exn::bail!(ErrorKind::PermissionDenied(denied.clone()));
        }
        guard.clear();
        Ok(())
    }
}
