//! Storage-agnostic interfaces consumed by the backup engine.

use crate::error::Result;
use crate::record::{FileMeta, FileRecord, Folder, FolderId, RecordId};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

pub type MetadataHandle = Arc<dyn MetadataStore + Send + Sync>;
pub type FolderHandle = Arc<dyn FolderIndex + Send + Sync>;

/// Persistent index of [`FileRecord`]s.
///
/// Every operation is atomic with respect to every other: no reader ever
/// observes a half-inserted record. Deletes are idempotent and report how
/// many records they removed; removing nothing is not an error.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record and return the identity assigned to it.
    ///
    /// A record already indexed at the same `(backup_id, file_path)` is
    /// replaced (and its identity retired) so the index mirrors the
    /// last-writer-wins file on disk. Records failing
    /// [`FileMeta::validate`] are rejected with
    /// [`Constraint`](crate::error::ErrorKind::Constraint).
    async fn insert(&self, file: &FileMeta) -> Result<RecordId>;

    /// All records of one backup, in insertion order.
    async fn find_all_by_backup_id(&self, backup_id: &str) -> Result<Vec<FileRecord>>;

    /// All records referencing a folder, in insertion order.
    async fn find_by_parent_folder(&self, folder: FolderId) -> Result<Vec<FileRecord>>;

    /// Every record, in insertion order.
    async fn find_all(&self) -> Result<Vec<FileRecord>>;

    /// Distinct backup ids across all records.
    ///
    /// The default implementation projects [`find_all`](Self::find_all);
    /// stores that can ask for the distinct values directly should.
    async fn find_distinct_backup_ids(&self) -> Result<BTreeSet<String>> {
        Ok(self.find_all().await?.into_iter().map(|record| record.into_meta().backup_id).collect())
    }

    /// Remove the record of one file; `path` is relative to the storage root.
    async fn delete_by_backup_id_and_path(&self, backup_id: &str, path: &Path) -> Result<u64>;

    /// Remove every record of a backup.
    async fn delete_by_backup_id(&self, backup_id: &str) -> Result<u64>;

    /// Remove every record.
    async fn delete_all(&self) -> Result<u64>;
}

/// Lookup-only view of the externally managed folder hierarchy.
#[async_trait]
pub trait FolderIndex: Send + Sync {
    async fn find_folder(&self, id: FolderId) -> Result<Option<Folder>>;
}
