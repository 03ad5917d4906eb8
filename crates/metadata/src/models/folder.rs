use crate::record::Folder;

#[derive(sqlx::FromRow)]
pub(crate) struct FolderRow {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}
impl From<FolderRow> for Folder {
    fn from(row: FolderRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            parent: row.parent_id,
        }
    }
}
