//! Index models.

use std::ffi::OsStr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use time::UtcDateTime;

use crate::error::{ErrorKind, Result};

/// Identity of a stored [`FileRecord`], assigned by the store on insert.
pub type RecordId = i64;
/// Identity of a [`Folder`] managed outside of this crate.
pub type FolderId = i64;

/// Everything known about a stored file except its identity.
///
/// This is what the engine hands to
/// [`MetadataStore::insert`](crate::MetadataStore::insert); the store answers
/// with the [`RecordId`] it assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Base name of the file (final path component)
    pub file_name: String,
    /// Path relative to the storage root, always `<backup_id>/...`
    pub file_path: PathBuf,
    /// Caller-supplied MIME type, never validated
    pub content_type: String,
    /// Bytes actually written
    pub size: u64,
    /// Snapshot this file belongs to
    pub backup_id: String,
    /// Set once at creation
    pub upload_date: UtcDateTime,
    /// Weak reference to an externally managed folder
    pub parent_folder: Option<FolderId>,
}
impl FileMeta {
    /// Describe a file just written to `file_path`.
    ///
    /// The file name is taken from the final component of the path and the
    /// upload date is "now", truncated to the second precision the index
    /// keeps.
    pub fn new(
        backup_id: impl Into<String>,
        file_path: impl Into<PathBuf>,
        content_type: impl Into<String>,
        size: u64,
    ) -> Self {
        let file_path = file_path.into();
        let file_name = file_path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        let now = UtcDateTime::now();
        Self {
            file_name,
            file_path,
            content_type: content_type.into(),
            size,
            backup_id: backup_id.into(),
            upload_date: UtcDateTime::from_unix_timestamp(now.unix_timestamp()).unwrap_or(now),
            parent_folder: None,
        }
    }

    pub fn with_parent_folder(mut self, folder: Option<FolderId>) -> Self {
        self.parent_folder = folder;
        self
    }

    pub fn with_id(self, id: RecordId) -> FileRecord {
        FileRecord { id, meta: self }
    }

    /// Check the invariants every store enforces before accepting a record.
    pub fn validate(&self) -> Result<()> {
        if self.backup_id.is_empty() {
            exn::bail!(ErrorKind::Constraint("empty backup id"));
        }
        if self.file_name.is_empty() {
            exn::bail!(ErrorKind::Constraint("empty file name"));
        }
        // The file must live strictly inside its own backup directory.
        let mut components = self.file_path.components();
        let first = components.next().map(|c| c.as_os_str());
        if first != Some(OsStr::new(&self.backup_id)) || components.next().is_none() {
            exn::bail!(ErrorKind::Constraint("file path outside of its backup"));
        }
        Ok(())
    }

    pub fn is_in_backup(&self, backup_id: &str) -> bool {
        self.backup_id == backup_id
    }

    pub fn has_path(&self, path: &Path) -> bool {
        self.file_path == path
    }
}

/// One entry in the index: a stored file instance.
///
/// Records are created once and never updated in place; dereferences to its
/// [`FileMeta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: RecordId,
    meta: FileMeta,
}
impl FileRecord {
    pub fn into_meta(self) -> FileMeta {
        self.meta
    }
}
impl Deref for FileRecord {
    type Target = FileMeta;
    fn deref(&self) -> &FileMeta {
        &self.meta
    }
}

/// Hierarchical grouping of files, owned by another part of the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub parent: Option<FolderId>,
}
