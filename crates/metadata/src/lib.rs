//! Metadata index for stored backup files.
//!
//! The index is the source of truth for what exists *logically*: which files
//! belong to which backup, their names, sizes, content types and optional
//! folder. The bytes themselves live in a storage backend; keeping the two in
//! step is the job of the backup engine, not of this crate.
//!
//! # Architecture
//! - [`MetadataStore`] and [`FolderIndex`] are the seams the engine consumes.
//! - [`Repository`] implements both on top of a SQLite [`Database`].
//! - `MemoryStore` (feature `mock`) implements both in memory, with switches
//!   to make writes fail.

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod memory;
mod models;
mod record;
mod repo;
mod store;

pub use crate::db::Database;
#[cfg(feature = "mock")]
pub use crate::memory::MemoryStore;
pub use crate::record::{FileMeta, FileRecord, Folder, FolderId, RecordId};
pub use crate::repo::Repository;
pub use crate::store::{FolderHandle, FolderIndex, MetadataHandle, MetadataStore};
