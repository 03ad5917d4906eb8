use crate::error::Error;
use savesync_metadata::FileRecord;
use savesync_storage::FileInfo;

/// One file handed to the engine for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Name relative to the backup directory; may contain sub-directories.
    pub file_name: String,
    /// Opaque MIME type, recorded as given.
    pub content_type: String,
    pub data: Vec<u8>,
}
impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Bytes of a stored file together with the descriptor they were read with.
#[derive(Debug, Clone)]
pub struct Download {
    pub info: FileInfo,
    /// Suggested name for whoever receives the bytes.
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Result of [`store_batch`](crate::BackupStorage::store_batch).
///
/// A batch is a best-effort sequence, not a transaction: everything in
/// `stored` is durable even when `failure` is set.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub stored: Vec<FileRecord>,
    pub failure: Option<BatchFailure>,
    /// Uploads never attempted because an earlier one failed.
    pub skipped: usize,
}
impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Turn a partial batch into an error, discarding the stored records.
    pub fn into_result(self) -> Result<Vec<FileRecord>, Error> {
        match self.failure {
            None => Ok(self.stored),
            Some(failure) => Err(failure.error),
        }
    }
}

/// The upload that stopped a batch, and why.
#[derive(Debug)]
pub struct BatchFailure {
    pub file_name: String,
    pub error: Error,
}
