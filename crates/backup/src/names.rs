//! Composition of storage paths from caller-supplied names.
//!
//! Backup ids and file names arrive from the network. Nothing here touches
//! the filesystem; containment against symlinks is the storage backend's job.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use savesync_storage::normalize_path;
use std::path::{Component, PathBuf};

/// Validate a backup id: it must be usable as exactly one path segment.
pub(crate) fn backup_dir(backup_id: &str) -> Result<PathBuf> {
    let invalid = || ErrorKind::InvalidName(backup_id.to_string());
    let normalized = normalize_path(backup_id).or_raise(invalid)?;
    let mut components = normalized.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) if segment == backup_id => Ok(normalized),
        _ => exn::bail!(invalid()),
    }
}

/// Compose `backup_id/file_name` and require the result to name a file
/// strictly inside the backup directory.
///
/// A leading separator in `file_name` is treated as relative to the backup.
pub(crate) fn file_path(backup_id: &str, file_name: &str) -> Result<PathBuf> {
    let dir = backup_dir(backup_id)?;
    if file_name.is_empty() {
        exn::bail!(ErrorKind::InvalidName(file_name.to_string()));
    }
    // String composition: joining an absolute `file_name` would replace the
    // backup directory instead of nesting inside it.
    let composed = format!("{backup_id}/{file_name}");
    let escape = || ErrorKind::PathEscape(PathBuf::from(&composed));
    let normalized = normalize_path(&composed).or_raise(escape)?;
    if !normalized.starts_with(&dir) || normalized == dir {
        exn::bail!(escape());
    }
    Ok(normalized)
}
