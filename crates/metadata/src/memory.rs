//! In-memory metadata index for testing.

use crate::error::{ErrorKind, Result};
use crate::record::{FileMeta, FileRecord, Folder, FolderId, RecordId};
use crate::store::{FolderIndex, MetadataStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_file: RecordId,
    next_folder: FolderId,
    // Keyed by id, so iteration order is insertion order.
    files: BTreeMap<RecordId, FileMeta>,
    folders: BTreeMap<FolderId, Folder>,
}

/// In-memory implementation of [`MetadataStore`] and [`FolderIndex`].
///
/// Behaves like [`Repository`](crate::Repository), including replacing a
/// record at an existing `(backup_id, file_path)`. [`fail_inserts`](Self::fail_inserts)
/// and [`fail_deletes`](Self::fail_deletes) make the corresponding calls fail
/// with [`Database`](ErrorKind::Database) so that callers can exercise their
/// error handling.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    fail_inserts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn create_folder(&self, name: impl Into<String>, parent: Option<FolderId>) -> Folder {
        let mut state = self.state.write().await;
        state.next_folder += 1;
        let folder = Folder {
            id: state.next_folder,
            name: name.into(),
            parent,
        };
        state.folders.insert(folder.id, folder.clone());
        folder
    }

    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Database);
        }
        Ok(())
    }

    async fn find(&self, predicate: impl Fn(&FileMeta) -> bool) -> Vec<FileRecord> {
        let state = self.state.read().await;
        state
            .files
            .iter()
            .filter(|(_, meta)| predicate(meta))
            .map(|(id, meta)| meta.clone().with_id(*id))
            .collect()
    }

    async fn delete(&self, predicate: impl Fn(&FileMeta) -> bool) -> Result<u64> {
        Self::check(&self.fail_deletes)?;
        let mut state = self.state.write().await;
        let before = state.files.len();
        state.files.retain(|_, meta| !predicate(meta));
        Ok((before - state.files.len()) as u64)
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn insert(&self, file: &FileMeta) -> Result<RecordId> {
        Self::check(&self.fail_inserts)?;
        file.validate()?;
        let mut state = self.state.write().await;
        state.files.retain(|_, meta| !(meta.is_in_backup(&file.backup_id) && meta.has_path(&file.file_path)));
        state.next_file += 1;
        let id = state.next_file;
        state.files.insert(id, file.clone());
        Ok(id)
    }

    async fn find_all_by_backup_id(&self, backup_id: &str) -> Result<Vec<FileRecord>> {
        Ok(self.find(|meta| meta.is_in_backup(backup_id)).await)
    }

    async fn find_by_parent_folder(&self, folder: FolderId) -> Result<Vec<FileRecord>> {
        Ok(self.find(|meta| meta.parent_folder == Some(folder)).await)
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>> {
        Ok(self.find(|_| true).await)
    }

    async fn delete_by_backup_id_and_path(&self, backup_id: &str, path: &Path) -> Result<u64> {
        self.delete(|meta| meta.is_in_backup(backup_id) && meta.has_path(path)).await
    }

    async fn delete_by_backup_id(&self, backup_id: &str) -> Result<u64> {
        self.delete(|meta| meta.is_in_backup(backup_id)).await
    }

    async fn delete_all(&self) -> Result<u64> {
        self.delete(|_| true).await
    }
}

#[async_trait]
impl FolderIndex for MemoryStore {
    async fn find_folder(&self, id: FolderId) -> Result<Option<Folder>> {
        Ok(self.state.read().await.folders.get(&id).cloned())
    }
}
