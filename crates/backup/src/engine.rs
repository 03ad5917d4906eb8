use crate::error::{ErrorKind, Result};
use crate::names::{backup_dir, file_path};
use crate::transfer::{BatchFailure, BatchOutcome, Download, Upload};
use savesync_metadata::{FileMeta, FileRecord, FolderHandle, FolderId, MetadataHandle};
use savesync_storage::BackendHandle;
use std::collections::BTreeSet;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Keeps backup bytes (in a storage backend) and their records (in a
/// metadata index) in step.
///
/// The two stores share no transaction. Bytes are always written before their
/// record is inserted, so a failure in between leaves an orphan file (see
/// [`reconcile`](Self::reconcile)) rather than a record without bytes.
///
/// `BackupStorage` holds no state of its own between calls and is cheap to
/// clone; operations on different `(backup_id, path)` pairs may run in
/// parallel.
#[derive(Clone)]
pub struct BackupStorage {
    pub(crate) backend: BackendHandle,
    pub(crate) metadata: MetadataHandle,
    folders: FolderHandle,
}

impl BackupStorage {
    pub fn new(backend: BackendHandle, metadata: MetadataHandle, folders: FolderHandle) -> Self {
        Self {
            backend,
            metadata,
            folders,
        }
    }

    /// Store one file under `backup_id`, then index it.
    ///
    /// Writing to a path already in use overwrites the bytes and replaces the
    /// record. A `parent_folder` unknown to the folder index is stored as
    /// `None`.
    ///
    /// # Errors
    /// - [`InvalidName`](ErrorKind::InvalidName) for an empty file name or a
    ///   backup id that is not a single path segment.
    /// - [`PathEscape`](ErrorKind::PathEscape) if the file would land outside
    ///   of the backup directory. Nothing is written.
    /// - [`Io`](ErrorKind::Io) if the bytes could not be written.
    /// - [`Metadata`](ErrorKind::Metadata) if the folder lookup or the insert
    ///   failed. After a failed insert the bytes stay on disk.
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.data.len()))]
    pub async fn store_file(
        &self,
        upload: &Upload,
        backup_id: &str,
        parent_folder: Option<FolderId>,
    ) -> Result<FileRecord> {
        let path = file_path(backup_id, &upload.file_name)?;
        let parent_folder = self.find_folder(parent_folder).await?;

        let size = self.backend.write(&path, &upload.data).await.map_err(ErrorKind::storage)?;
        let meta = FileMeta::new(backup_id, &path, &upload.content_type, size).with_parent_folder(parent_folder);
        let id = match self.metadata.insert(&meta).await {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(path = %path.display(), "file written but not indexed: {err}");
                return Err(ErrorKind::metadata(err));
            },
        };
        tracing::info!(id, backup_id, path = %path.display(), size, "stored file");
        Ok(meta.with_id(id))
    }

    /// Store uploads one after another.
    ///
    /// The first failure stops the batch; files stored before it stay stored.
    /// `cancel` is checked before every file and stops the batch with
    /// [`Cancelled`](ErrorKind::Cancelled).
    #[instrument(skip(self, uploads, cancel))]
    pub async fn store_batch(
        &self,
        uploads: impl IntoIterator<Item = Upload>,
        backup_id: &str,
        parent_folder: Option<FolderId>,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut uploads = uploads.into_iter();
        while let Some(upload) = uploads.next() {
            let result = if cancel.is_cancelled() {
                Err(exn::Exn::from(ErrorKind::Cancelled))
            } else {
                self.store_file(&upload, backup_id, parent_folder).await
            };
            match result {
                Ok(record) => outcome.stored.push(record),
                Err(error) => {
                    outcome.skipped = uploads.by_ref().count();
                    tracing::warn!(
                        file_name = %upload.file_name,
                        stored = outcome.stored.len(),
                        skipped = outcome.skipped,
                        "batch stopped: {error}"
                    );
                    outcome.failure = Some(BatchFailure {
                        file_name: upload.file_name,
                        error,
                    });
                    break;
                },
            }
        }
        outcome
    }

    /// Read a stored file straight from the storage backend.
    ///
    /// The metadata index is not consulted: a record whose bytes have gone
    /// missing reads as [`NotFound`](ErrorKind::NotFound), and so does a
    /// directory or a file that cannot be read.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> Result<Download> {
        let path = path.as_ref();
        let info = self.backend.stat(path).await.map_err(ErrorKind::storage_read)?;
        let data = self.backend.read(&info.path).await.map_err(ErrorKind::storage_read)?;
        Ok(Download {
            file_name: info.file_name(),
            info,
            data,
        })
    }

    /// Delete one file from a backup, then its record.
    ///
    /// Returns whether a file was actually removed. The record is removed
    /// even if the file was already gone; failing to remove it is logged and
    /// does not change the result.
    #[instrument(skip(self))]
    pub async fn delete_file(&self, backup_id: &str, file_name: &str) -> Result<bool> {
        let path = file_path(backup_id, file_name)?;
        let existed = self.backend.remove_file(&path).await.map_err(ErrorKind::storage)?;
        match self.metadata.delete_by_backup_id_and_path(backup_id, &path).await {
            Ok(removed) => tracing::debug!(removed, "deleted file records"),
            Err(err) => tracing::warn!(path = %path.display(), "stale record left behind: {err}"),
        }
        if existed {
            tracing::info!(backup_id, path = %path.display(), "deleted file");
        }
        Ok(existed)
    }

    /// Delete a whole backup directory and, once it is gone, every record of
    /// the backup.
    ///
    /// Returns `true` iff the directory no longer exists, including when it
    /// never existed. If the directory survives (for example on a permission
    /// error) the records are left untouched and `false` is returned.
    #[instrument(skip(self))]
    pub async fn delete_backup(&self, backup_id: &str) -> Result<bool> {
        let dir = backup_dir(backup_id)?;
        if let Err(err) = self.backend.remove_dir_all(&dir).await {
            tracing::warn!("could not remove backup directory: {err}");
        }
        if self.backend.exists(&dir).await.map_err(ErrorKind::storage)? {
            return Ok(false);
        }
        let removed = self.metadata.delete_by_backup_id(backup_id).await.map_err(ErrorKind::metadata)?;
        tracing::info!(backup_id, removed, "deleted backup");
        Ok(true)
    }

    /// Delete everything underneath the storage root, then every record.
    ///
    /// Records are only removed once the storage root is verified empty.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<()> {
        self.backend.clear().await.map_err(ErrorKind::storage)?;
        let left = self.backend.list(None).await.map_err(ErrorKind::storage)?;
        if !left.is_empty() {
            tracing::warn!(left = left.len(), "storage root not empty after clearing; records kept");
            exn::bail!(ErrorKind::Io);
        }
        let removed = self.metadata.delete_all().await.map_err(ErrorKind::metadata)?;
        tracing::info!(removed, "deleted all backups");
        Ok(())
    }

    /// Every record, in insertion order.
    pub async fn list_all(&self) -> Result<Vec<FileRecord>> {
        self.metadata.find_all().await.map_err(ErrorKind::metadata)
    }

    /// Every record of one backup, in insertion order.
    pub async fn list_by_backup(&self, backup_id: &str) -> Result<Vec<FileRecord>> {
        self.metadata.find_all_by_backup_id(backup_id).await.map_err(ErrorKind::metadata)
    }

    /// Every record referencing `folder`.
    pub async fn list_by_folder(&self, folder: FolderId) -> Result<Vec<FileRecord>> {
        self.metadata.find_by_parent_folder(folder).await.map_err(ErrorKind::metadata)
    }

    /// Distinct backup ids across all records.
    pub async fn list_backup_ids(&self) -> Result<BTreeSet<String>> {
        self.metadata.find_distinct_backup_ids().await.map_err(ErrorKind::metadata)
    }

    /// Folders are weak references: an id the index doesn't know is dropped.
    async fn find_folder(&self, folder: Option<FolderId>) -> Result<Option<FolderId>> {
        let Some(id) = folder else {
            return Ok(None);
        };
        match self.folders.find_folder(id).await.map_err(ErrorKind::metadata)? {
            Some(folder) => Ok(Some(folder.id)),
            None => {
                tracing::warn!(folder = id, "unknown parent folder; storing without one");
                Ok(None)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use savesync_metadata::{Database, MemoryStore, MetadataStore, Repository};
    use savesync_storage::backend::{LocalBackend, MockBackend, StorageBackend};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Local {
        // Dropping the directory removes the storage root.
        _dir: TempDir,
        engine: BackupStorage,
        backend: Arc<LocalBackend>,
        repo: Repository,
    }

    async fn local() -> Local {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalBackend::open("local", dir.path().join("storage")).unwrap());
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let engine = BackupStorage::new(backend.clone(), Arc::new(repo.clone()), Arc::new(repo.clone()));
        Local {
            _dir: dir,
            engine,
            backend,
            repo,
        }
    }

    fn mock(backend: MockBackend) -> (BackupStorage, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = BackupStorage::new(Arc::new(backend), store.clone(), store.clone());
        (engine, store)
    }

    fn upload(file_name: &str, size: usize) -> Upload {
        Upload::new(file_name, "application/octet-stream", vec![b'x'; size])
    }

    #[tokio::test]
    async fn test_store_list_and_delete_scenario() {
        let Local { _dir, engine, .. } = local().await;
        engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap();
        engine.store_file(&upload("save2.dat", 20), "1000", None).await.unwrap();

        let files = engine.list_by_backup("1000").await.unwrap();
        let files: Vec<_> = files.iter().map(|f| (f.file_name.as_str(), f.size)).collect();
        assert_eq!(files, vec![("save1.dat", 10), ("save2.dat", 20)]);

        assert!(engine.delete_file("1000", "save1.dat").await.unwrap());
        let files = engine.list_by_backup("1000").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "save2.dat");
    }

    #[rstest]
    #[case("save1.dat", b"0123456789".to_vec())]
    #[case("slot1/save1.dat", b"nested".to_vec())]
    #[case("empty.dat", Vec::new())]
    #[case("/leading.dat", vec![0u8, 255, 1, 254])]
    #[tokio::test]
    async fn test_store_then_read(#[case] file_name: &str, #[case] data: Vec<u8>) {
        let Local { _dir, engine, .. } = local().await;
        let upload = Upload::new(file_name, "application/octet-stream", data.clone());
        let record = engine.store_file(&upload, "1000", None).await.unwrap();
        assert_eq!(record.size, data.len() as u64);
        assert!(record.file_path.starts_with("1000"));

        let download = engine.read_file(&record.file_path).await.unwrap();
        assert_eq!(download.data, data);
        assert_eq!(download.info.size, data.len() as u64);
        assert_eq!(download.file_name, record.file_name);
    }

    #[tokio::test]
    async fn test_record_matches_upload() {
        let Local { _dir, engine, .. } = local().await;
        let upload = Upload::new("slot1/save1.dat", "text/plain", b"hello".to_vec());
        let record = engine.store_file(&upload, "1000", None).await.unwrap();
        assert_eq!(record.file_name, "save1.dat");
        assert_eq!(record.file_path, Path::new("1000/slot1/save1.dat"));
        assert_eq!(record.content_type, "text/plain");
        assert_eq!(record.backup_id, "1000");
        assert_eq!(record.parent_folder, None);
        assert_eq!(engine.list_all().await.unwrap(), vec![record]);
    }

    #[rstest]
    #[case("../../etc/passwd")]
    #[case("../escape.dat")]
    #[case("../2000/save1.dat")]
    #[case("slot1/../../escape.dat")]
    #[tokio::test]
    async fn test_traversal_is_rejected(#[case] file_name: &str) {
        let Local { _dir, engine, backend, .. } = local().await;
        let err = engine.store_file(&upload(file_name, 4), "1000", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)), "{file_name}");
        assert!(backend.list(None).await.unwrap().is_empty());
        assert!(engine.list_all().await.unwrap().is_empty());
        let root = backend.resolver().root();
        assert!(!root.parent().unwrap().join("etc").exists());
        assert!(!root.parent().unwrap().join("escape.dat").exists());
    }

    #[rstest]
    #[case("")]
    #[case("10/00")]
    #[case("..")]
    #[tokio::test]
    async fn test_invalid_backup_id(#[case] backup_id: &str) {
        let (engine, store) = mock(MockBackend::default());
        let err = engine.store_file(&upload("save1.dat", 1), backup_id, None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(_)));
        assert!(store.find_all().await.unwrap().is_empty());
        assert!(matches!(&*engine.delete_backup(backup_id).await.unwrap_err(), ErrorKind::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_empty_file_name() {
        let (engine, _) = mock(MockBackend::default());
        let err = engine.store_file(&upload("", 1), "1000", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_record() {
        let Local { _dir, engine, .. } = local().await;
        let first = engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap();
        let second = engine.store_file(&upload("save1.dat", 3), "1000", None).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(engine.list_by_backup("1000").await.unwrap(), vec![second]);
        assert_eq!(engine.read_file("1000/save1.dat").await.unwrap().data, b"xxx");
    }

    #[tokio::test]
    async fn test_delete_file_twice() {
        let Local { _dir, engine, .. } = local().await;
        assert!(!engine.delete_file("1000", "missing.dat").await.unwrap());
        assert!(!engine.delete_file("1000", "missing.dat").await.unwrap());

        engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap();
        assert!(engine.delete_file("1000", "save1.dat").await.unwrap());
        assert!(!engine.delete_file("1000", "save1.dat").await.unwrap());
        assert!(engine.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_file_removes_stale_record() {
        let Local { _dir, engine, backend, .. } = local().await;
        engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap();
        backend.remove_file(Path::new("1000/save1.dat")).await.unwrap();
        assert!(!engine.delete_file("1000", "save1.dat").await.unwrap());
        assert!(engine.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_file_ignores_metadata_failure() {
        let (engine, store) = mock(MockBackend::default());
        engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap();
        store.fail_deletes(true);
        assert!(engine.delete_file("1000", "save1.dat").await.unwrap());
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_file_escape() {
        let (engine, _) = mock(MockBackend::default());
        let err = engine.delete_file("1000", "../2000/save1.dat").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
    }

    #[tokio::test]
    async fn test_delete_backup_cascades() {
        let Local { _dir, engine, backend, .. } = local().await;
        engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap();
        engine.store_file(&upload("slot1/save2.dat", 20), "1000", None).await.unwrap();
        engine.store_file(&upload("save1.dat", 30), "2000", None).await.unwrap();

        assert!(engine.delete_backup("1000").await.unwrap());
        assert!(!backend.exists(Path::new("1000")).await.unwrap());
        assert!(engine.list_by_backup("1000").await.unwrap().is_empty());
        assert_eq!(engine.list_by_backup("2000").await.unwrap().len(), 1);
        assert!(backend.exists(Path::new("2000/save1.dat")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_unknown_backup() {
        let Local { _dir, engine, .. } = local().await;
        assert!(engine.delete_backup("1000").await.unwrap());
        assert!(engine.delete_backup("1000").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_backup_failure_keeps_records() {
        let backend = MockBackend::with_files([("1000/save1.dat", b"0123456789")]).deny("1000");
        let (engine, store) = mock(backend);
        store.insert(&FileMeta::new("1000", "1000/save1.dat", "application/octet-stream", 10)).await.unwrap();

        assert!(!engine.delete_backup("1000").await.unwrap());
        assert_eq!(engine.list_by_backup("1000").await.unwrap().len(), 1);
        assert_eq!(engine.read_file("1000/save1.dat").await.unwrap().data, b"0123456789");
    }

    #[tokio::test]
    async fn test_delete_all_cascades() {
        let Local { _dir, engine, backend, .. } = local().await;
        engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap();
        engine.store_file(&upload("save1.dat", 10), "2000", None).await.unwrap();
        engine.delete_all().await.unwrap();
        assert!(backend.list(None).await.unwrap().is_empty());
        assert!(backend.resolver().root().is_dir());
        assert!(engine.list_all().await.unwrap().is_empty());
        assert!(engine.list_backup_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_failure_keeps_records() {
        let backend = MockBackend::with_files([("1000/save1.dat", b"0123456789")]).deny("1000");
        let (engine, store) = mock(backend);
        store.insert(&FileMeta::new("1000", "1000/save1.dat", "application/octet-stream", 10)).await.unwrap();
        let err = engine.delete_all().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io));
        assert_eq!(engine.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_backup_ids() {
        let Local { _dir, engine, .. } = local().await;
        for (backup_id, file_name) in [("1000", "a.dat"), ("1000", "b.dat"), ("2000", "a.dat"), ("1000", "a.dat")] {
            engine.store_file(&upload(file_name, 1), backup_id, None).await.unwrap();
        }
        let ids = engine.list_backup_ids().await.unwrap();
        assert_eq!(ids, BTreeSet::from(["1000".to_string(), "2000".to_string()]));
        let distinct: BTreeSet<_> = engine.list_all().await.unwrap().into_iter().map(|r| r.backup_id.clone()).collect();
        assert_eq!(ids, distinct);
    }

    #[tokio::test]
    async fn test_parent_folder() {
        let Local { _dir, engine, repo, .. } = local().await;
        let folder = repo.create_folder("saves", None).await.unwrap();
        let kept = engine.store_file(&upload("a.dat", 1), "1000", Some(folder.id)).await.unwrap();
        assert_eq!(kept.parent_folder, Some(folder.id));
        let dropped = engine.store_file(&upload("b.dat", 1), "1000", Some(folder.id + 100)).await.unwrap();
        assert_eq!(dropped.parent_folder, None);

        assert_eq!(engine.list_by_folder(folder.id).await.unwrap(), vec![kept]);
        assert!(engine.list_by_folder(folder.id + 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_file_errors() {
        let Local { _dir, engine, .. } = local().await;
        engine.store_file(&upload("slot1/save1.dat", 1), "1000", None).await.unwrap();

        let err = engine.read_file("1000/missing.dat").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = engine.read_file("1000/slot1").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = engine.read_file("../outside.dat").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
        let err = engine.read_file("").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathEscape(_)));
    }

    #[tokio::test]
    async fn test_path_through_stored_file() {
        let Local { _dir, engine, repo, .. } = local().await;
        engine.store_file(&upload("save1.dat", 4), "1000", None).await.unwrap();

        let err = engine.read_file("1000/save1.dat/x").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(!engine.delete_file("1000", "save1.dat/x").await.unwrap());
        let err = engine.store_file(&upload("save1.dat/x", 1), "1000", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io));

        // The file in the way is untouched.
        assert_eq!(engine.read_file("1000/save1.dat").await.unwrap().data.len(), 4);
        assert_eq!(repo.find_all_by_backup_id("1000").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_ignores_metadata() {
        let Local { _dir, engine, backend, .. } = local().await;
        engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap();
        backend.remove_file(Path::new("1000/save1.dat")).await.unwrap();
        assert_eq!(engine.list_by_backup("1000").await.unwrap().len(), 1);
        let err = engine.read_file("1000/save1.dat").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));

        // Bytes without a record are still served.
        backend.write(Path::new("2000/unindexed.dat"), b"raw").await.unwrap();
        assert_eq!(engine.read_file("2000/unindexed.dat").await.unwrap().data, b"raw");
    }

    #[tokio::test]
    async fn test_metadata_failure_leaves_orphan() {
        let (engine, store) = mock(MockBackend::default());
        store.fail_inserts(true);
        let err = engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Metadata));
        assert!(engine.backend.exists(Path::new("1000/save1.dat")).await.unwrap());
        assert!(engine.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_indexes_nothing() {
        let (engine, store) = mock(MockBackend::default().deny("1000"));
        let err = engine.store_file(&upload("save1.dat", 10), "1000", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io));
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_stops_at_first_failure() {
        let (engine, _) = mock(MockBackend::default());
        let uploads = vec![upload("a.dat", 1), upload("b.dat", 2), upload("../c.dat", 3), upload("d.dat", 4)];
        let outcome = engine.store_batch(uploads, "1000", None, &CancellationToken::new()).await;
        assert!(!outcome.is_complete());
        assert_eq!(outcome.stored.len(), 2);
        assert_eq!(outcome.skipped, 1);
        let failure = outcome.failure.as_ref().unwrap();
        assert_eq!(failure.file_name, "../c.dat");
        assert!(matches!(&*failure.error, ErrorKind::PathEscape(_)));
        // Earlier files are not rolled back.
        assert_eq!(engine.list_by_backup("1000").await.unwrap().len(), 2);
        assert!(!engine.backend.exists(Path::new("1000/d.dat")).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_complete() {
        let (engine, _) = mock(MockBackend::default());
        let uploads = vec![upload("a.dat", 1), upload("b.dat", 2)];
        let outcome = engine.store_batch(uploads, "1000", None, &CancellationToken::new()).await;
        let stored = outcome.into_result().unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_cancelled() {
        let (engine, store) = mock(MockBackend::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = engine.store_batch(vec![upload("a.dat", 1), upload("b.dat", 2)], "1000", None, &cancel).await;
        assert!(outcome.stored.is_empty());
        assert_eq!(outcome.skipped, 1);
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cancelled));
        assert!(store.find_all().await.unwrap().is_empty());
    }
}
