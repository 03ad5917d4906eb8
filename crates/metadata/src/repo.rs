//! SQLite implementation of the metadata index.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRow, FolderRow};
use crate::record::{FileMeta, FileRecord, Folder, FolderId, RecordId};
use crate::store::{FolderIndex, MetadataStore};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::instrument;

/// Repository for file records and folder lookups in the metadata database.
///
/// # Relationships
///
/// - Many files can belong to the same backup (grouped by `backup_id`)
/// - One file per `(backup_id, file_path)`; storing again replaces the record
/// - Files reference folders weakly; deleting a folder clears the reference
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    fn sqlx_hates_paths(path: impl AsRef<Path>) -> Result<String> {
        Ok(path.as_ref().to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
    }

    fn into_records(rows: Vec<FileRow>) -> Result<Vec<FileRecord>> {
        rows.into_iter().map(FileRecord::try_from).collect()
    }

    /// Create a folder.
    ///
    /// Folder management belongs to another part of the system; this exists
    /// so that callers (and tests) can seed the hierarchy.
    pub async fn create_folder(&self, name: impl AsRef<str>, parent: Option<FolderId>) -> Result<Folder> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_folder.sql"))
            .bind(name.as_ref())
            .bind(parent)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Folder {
            id,
            name: name.as_ref().to_string(),
            parent,
        })
    }
}

#[async_trait]
impl MetadataStore for Repository {
    #[instrument(skip(self, file), fields(backup_id = %file.backup_id, path = %file.file_path.display()))]
    async fn insert(&self, file: &FileMeta) -> Result<RecordId> {
        file.validate()?;
        let row = FileRow::try_from(file)?;
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_file.sql"))
            .bind(row.file_name)
            .bind(row.file_path)
            .bind(row.content_type)
            .bind(row.size)
            .bind(row.backup_id)
            .bind(row.upload_date)
            .bind(row.parent_folder_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    async fn find_all_by_backup_id(&self, backup_id: &str) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/find_files_by_backup_id.sql"))
            .bind(backup_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::into_records(rows)
    }

    async fn find_by_parent_folder(&self, folder: FolderId) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/find_files_by_parent_folder.sql"))
            .bind(folder)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::into_records(rows)
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/find_all_files.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::into_records(rows)
    }

    async fn find_distinct_backup_ids(&self) -> Result<BTreeSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(include_str!("../queries/find_distinct_backup_ids.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(ids.into_iter().collect())
    }

    async fn delete_by_backup_id_and_path(&self, backup_id: &str, path: &Path) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_files_by_backup_id_and_path.sql"))
            .bind(backup_id)
            .bind(Self::sqlx_hates_paths(path)?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    async fn delete_by_backup_id(&self, backup_id: &str) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_files_by_backup_id.sql"))
            .bind(backup_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_all_files.sql"))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FolderIndex for Repository {
    async fn find_folder(&self, id: FolderId) -> Result<Option<Folder>> {
        let row: Option<FolderRow> = sqlx::query_as(include_str!("../queries/get_folder.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(Folder::from))
    }
}
