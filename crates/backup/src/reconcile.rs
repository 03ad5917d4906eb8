//! Comparison of the bytes on disk against the metadata index.

use crate::BackupStorage;
use crate::error::{ErrorKind, Result};
use futures::TryStreamExt;
use savesync_metadata::FileRecord;
use savesync_storage::FileInfo;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::instrument;

/// Differences between storage and index found by
/// [`BackupStorage::reconcile`].
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Files on disk without a record, e.g. after an insert failed.
    pub orphan_files: Vec<FileInfo>,
    /// Records whose file is missing.
    pub phantom_records: Vec<FileRecord>,
    /// Records whose size disagrees with the file on disk.
    pub size_mismatches: Vec<SizeMismatch>,
}
impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.orphan_files.is_empty() && self.phantom_records.is_empty() && self.size_mismatches.is_empty()
    }
}

#[derive(Debug)]
pub struct SizeMismatch {
    pub record: FileRecord,
    /// Size of the file currently on disk.
    pub actual: u64,
}

impl BackupStorage {
    /// Walk the storage root and the index and report where they disagree.
    ///
    /// Nothing is repaired. Stores running concurrently with the walk can show
    /// up as orphans.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<Reconciliation> {
        let mut on_disk: BTreeMap<PathBuf, FileInfo> = BTreeMap::new();
        let mut stream = self.backend.list_stream(None);
        while let Some(info) = stream.try_next().await.map_err(ErrorKind::storage)? {
            on_disk.insert(info.path.clone(), info);
        }
        drop(stream);
        let records = self.metadata.find_all().await.map_err(ErrorKind::metadata)?;

        let mut report = Reconciliation::default();
        for record in records {
            match on_disk.remove(&record.file_path) {
                None => report.phantom_records.push(record),
                Some(info) if info.size != record.size => report.size_mismatches.push(SizeMismatch {
                    record,
                    actual: info.size,
                }),
                Some(_) => {},
            }
        }
        report.orphan_files = on_disk.into_values().collect();

        tracing::info!(
            orphans = report.orphan_files.len(),
            phantoms = report.phantom_records.len(),
            mismatches = report.size_mismatches.len(),
            "reconciled storage with metadata"
        );
        Ok(report)
    }
}
