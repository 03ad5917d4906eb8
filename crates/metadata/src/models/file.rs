use crate::error::{Error, ErrorKind};
use crate::record::{FileMeta, FileRecord};
use exn::{OptionExt, ResultExt};
use std::path::PathBuf;
use time::UtcDateTime;

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    // Absent until the row has been inserted.
    pub id: Option<i64>,
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
    pub size: i64,
    pub backup_id: String,
    pub upload_date: i64,
    pub parent_folder_id: Option<i64>,
}
impl TryFrom<&FileMeta> for FileRow {
    type Error = Error;
    fn try_from(file: &FileMeta) -> Result<Self, Self::Error> {
        Ok(Self {
            id: None,
            file_name: file.file_name.clone(),
            file_path: file.file_path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string(),
            content_type: file.content_type.clone(),
            size: i64::try_from(file.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            backup_id: file.backup_id.clone(),
            upload_date: file.upload_date.unix_timestamp(),
            parent_folder_id: file.parent_folder,
        })
    }
}
impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let id = row.id.ok_or_raise(|| ErrorKind::InvalidData("record id"))?;
        let meta = FileMeta {
            file_name: row.file_name,
            file_path: PathBuf::from(row.file_path),
            content_type: row.content_type,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            backup_id: row.backup_id,
            upload_date: UtcDateTime::from_unix_timestamp(row.upload_date)
                .or_raise(|| ErrorKind::InvalidData("upload date"))?,
            parent_folder: row.parent_folder_id,
        };
        Ok(meta.with_id(id))
    }
}
