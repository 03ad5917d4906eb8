mod file;
mod folder;

pub(crate) use self::file::FileRow;
pub(crate) use self::folder::FolderRow;
