//! Local filesystem storage backend.
//!
//! Files are stored underneath the root owned by a [`PathResolver`] and
//! accessed via `tokio::fs` for async I/O.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{FileInfo, PathResolver, StorageBackend, error::Result, normalize_path};
use async_stream::stream;
use async_trait::async_trait;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// Every path is resolved by the backend's [`PathResolver`] before any I/O,
/// so nothing outside the storage root can be read, written or deleted.
///
/// # Examples
///
/// ```no_run
/// use savesync_storage::{PathResolver, backend::LocalBackend};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", PathResolver::new("/srv/savesync/storage")?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    resolver: PathResolver,
}
impl LocalBackend {
    /// Create a new local filesystem backend around an already initialized
    /// storage root.
    pub fn new(name: impl Into<String>, resolver: PathResolver) -> Self {
        Self { name: name.into(), resolver }
    }

    /// Initialize the storage root at `root` and wrap it in a backend.
    ///
    /// Fails with [`StorageInit`](crate::error::ErrorKind::StorageInit) if the
    /// root cannot be created.
    pub fn open(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(name, PathResolver::new(root)?))
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    fn file_info(path: &Path, metadata: &Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(FileInfo::new(path, metadata.len(), UtcDateTime::from(modified)))
    }

    /// Metadata for a regular file; directories and other oddities count as
    /// "not found" because they can never be served as file content.
    async fn file_metadata(absolute: &Path, relative: &Path) -> Result<Metadata> {
        let metadata = fs::metadata(absolute).await.map_err(|e| ErrorKind::from_io(e, relative))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(relative.to_path_buf()));
        }
        Ok(metadata)
    }

    async fn process_entry(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<WalkEntry> {
        let path = entry.path();
        // `DirEntry::metadata` does not follow symlinks, so a link pointing
        // out of the root is never descended into.
        let metadata = entry.metadata().await.map_err(|e| ErrorKind::from_io(e, &path))?;
        let relative = self.resolver.relative(&path)?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if let Some(pfx) = prefix
            && !relative.starts_with(pfx)
        {
            return Ok(WalkEntry::Skip);
        }
        if metadata.is_file() {
            return Ok(WalkEntry::File(Self::file_info(&relative, &metadata)?));
        }
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(normalize_path).transpose() {
            Ok(pfx) => pfx.filter(|p| !p.as_os_str().is_empty()),
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        Box::pin(stream! {
            // Start from the prefix directory itself; a prefix that is a file
            // or doesn't exist simply yields nothing from `read_dir`.
            let start_dir = match &validated_prefix {
                Some(pfx) => match self.resolver.resolve(pfx).await {
                    Ok(resolved) => resolved.absolute,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                },
                None => self.resolver.root().to_path_buf(),
            };
            let mut stack = vec![start_dir];
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Asking for the contents of a directory that doesn't
                    // exist results in an empty list, not an error.
                    Err(err) if matches!(err.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory) => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(ErrorKind::from_io(err, &current)));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(ErrorKind::from_io(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let resolved = self.resolver.resolve(path).await?;
        match fs::try_exists(&resolved.absolute).await {
            Ok(exists) => Ok(exists),
            Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => Ok(false),
            Err(e) => exn::bail!(ErrorKind::Io(e)),
        }
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let resolved = self.resolver.resolve_file(path).await?;
        let metadata = Self::file_metadata(&resolved.absolute, &resolved.relative).await?;
        Self::file_info(&resolved.relative, &metadata)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let resolved = self.resolver.resolve_file(path).await?;
        Self::file_metadata(&resolved.absolute, &resolved.relative).await?;
        Ok(fs::read(&resolved.absolute).await.map_err(|e| ErrorKind::from_io(e, &resolved.relative))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<u64> {
        let resolved = self.resolver.resolve_file(path).await?;
        if let Some(parent) = resolved.absolute.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, &resolved.relative))?;
        }
        fs::write(&resolved.absolute, data).await.map_err(|e| ErrorKind::from_io(e, &resolved.relative))?;
        tracing::trace!(backend = %self.name, path = %resolved.relative.display(), bytes = data.len(), "Wrote file");
        Ok(data.len() as u64)
    }

    async fn remove_file(&self, path: &Path) -> Result<bool> {
        let resolved = self.resolver.resolve_file(path).await?;
        match fs::remove_file(&resolved.absolute).await {
            Ok(()) => Ok(true),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory) => Ok(false),
            Err(e) => exn::bail!(ErrorKind::from_io(e, &resolved.relative)),
        }
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let resolved = self.resolver.resolve_file(path).await?;
        match fs::remove_dir_all(&resolved.absolute).await {
            Ok(()) => Ok(()),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory) => Ok(()),
            Err(e) => exn::bail!(ErrorKind::from_io(e, &resolved.relative)),
        }
    }

    async fn clear(&self) -> Result<()> {
        let root = self.resolver.root();
        let mut entries = fs::read_dir(root).await.map_err(|e| ErrorKind::from_io(e, root))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| ErrorKind::from_io(e, root))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| ErrorKind::from_io(e, &path))?;
            let removed = match file_type.is_dir() {
                true => fs::remove_dir_all(&path).await,
                // Symlinks are removed, never followed.
                false => fs::remove_file(&path).await,
            };
            removed.map_err(|e| ErrorKind::from_io(e, &path))?;
        }
        Ok(())
    }
}
