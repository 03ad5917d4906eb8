use clap::{Parser, Subcommand};
use savesync_metadata::FolderId;
use std::path::PathBuf;
use time::UtcDateTime;

#[derive(Parser, Debug)]
#[command(name = "savesync", version, about = "Store and manage save file backups")]
pub struct Cli {
    /// Configuration file (TOML); defaults to `savesync.toml` in the
    /// platform config directory
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store files in a backup
    Store {
        /// Backup to store into; a new one (current time in milliseconds)
        /// if omitted
        #[arg(long, short)]
        backup: Option<String>,
        /// Folder the files belong to
        #[arg(long, short)]
        folder: Option<FolderId>,
        /// Content type for every file instead of guessing from the extension
        #[arg(long)]
        content_type: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Read a stored file, by path relative to the storage root
    Read {
        path: PathBuf,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List stored files
    List {
        #[arg(long, short, conflicts_with = "folder")]
        backup: Option<String>,
        #[arg(long, short)]
        folder: Option<FolderId>,
    },
    /// List backup ids
    Backups,
    /// Delete one file from a backup
    DeleteFile { backup: String, file_name: String },
    /// Delete a backup and every file in it
    DeleteBackup { backup: String },
    /// Delete every backup
    DeleteAll {
        /// Required, there is no undo
        #[arg(long)]
        yes: bool,
    },
    /// Report differences between stored files and the metadata index
    Reconcile,
}

/// Backup id for a new backup: the current UTC time in milliseconds.
pub fn new_backup_id(now: UtcDateTime) -> String {
    (now.unix_timestamp_nanos() / 1_000_000).to_string()
}
