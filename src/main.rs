mod cli;
mod error;
mod logging;

use crate::cli::{Cli, Command, new_backup_id};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::{OptionExt, ResultExt};
use savesync_backup::{BackupStorage, CancellationToken, Upload};
use savesync_config::Config;
use savesync_metadata::{Database, FileRecord, Repository};
use savesync_storage::backend::LocalBackend;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use time::UtcDateTime;
use time::format_description::well_known::Rfc3339;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    logging::init(&config.log)?;

    let backend = LocalBackend::open("local", &config.storage.root).or_raise(|| ErrorKind::Storage)?;
    let db = Database::connect_with(&config.metadata.database, Some(config.metadata.max_connections))
        .await
        .or_raise(|| ErrorKind::Metadata)?;
    let repo = Arc::new(Repository::from(&db));
    let engine = BackupStorage::new(Arc::new(backend), repo.clone(), repo);

    let result = execute(&engine, cli.command).await;
    db.close().await;
    result
}

async fn execute(engine: &BackupStorage, command: Command) -> Result<()> {
    match command {
        Command::Store {
            backup,
            folder,
            content_type,
            files,
        } => {
            let backup_id = backup.unwrap_or_else(|| new_backup_id(UtcDateTime::now()));
            let mut uploads = Vec::with_capacity(files.len());
            for file in &files {
                uploads.push(read_upload(file, content_type.as_deref()).await?);
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted; stopping after the current file");
                    on_interrupt.cancel();
                }
            });

            let outcome = engine.store_batch(uploads, &backup_id, folder, &cancel).await;
            for record in &outcome.stored {
                print_record(record);
            }
            if let Some(failure) = outcome.failure {
                let message = format!(
                    "stored {} of {} files in backup {backup_id}",
                    outcome.stored.len(),
                    files.len()
                );
                return Err(failure.error).or_raise(|| ErrorKind::Incomplete(message));
            }
            println!("backup {backup_id}");
        },
        Command::Read { path, output } => {
            let download = engine.read_file(&path).await.or_raise(|| ErrorKind::Backup)?;
            match output {
                Some(output) => {
                    tokio::fs::write(&output, &download.data).await.or_raise(|| ErrorKind::Io(output.clone()))?;
                    tracing::info!(file = %download.file_name, size = download.info.size, "saved to {}", output.display());
                },
                None => std::io::stdout()
                    .lock()
                    .write_all(&download.data)
                    .or_raise(|| ErrorKind::Io(PathBuf::from("<stdout>")))?,
            }
        },
        Command::List { backup, folder } => {
            let records = match (backup, folder) {
                (Some(backup), _) => engine.list_by_backup(&backup).await,
                (None, Some(folder)) => engine.list_by_folder(folder).await,
                (None, None) => engine.list_all().await,
            }
            .or_raise(|| ErrorKind::Backup)?;
            records.iter().for_each(print_record);
        },
        Command::Backups => {
            for backup_id in engine.list_backup_ids().await.or_raise(|| ErrorKind::Backup)? {
                println!("{backup_id}");
            }
        },
        Command::DeleteFile { backup, file_name } => {
            let existed = engine.delete_file(&backup, &file_name).await.or_raise(|| ErrorKind::Backup)?;
            if !existed {
                println!("{backup}/{file_name} did not exist");
            }
        },
        Command::DeleteBackup { backup } => {
            if !engine.delete_backup(&backup).await.or_raise(|| ErrorKind::Backup)? {
                exn::bail!(ErrorKind::Incomplete(format!("backup {backup} could not be fully removed")));
            }
        },
        Command::DeleteAll { yes } => {
            if !yes {
                exn::bail!(ErrorKind::Incomplete("refusing to delete every backup without --yes".to_string()));
            }
            engine.delete_all().await.or_raise(|| ErrorKind::Backup)?;
        },
        Command::Reconcile => {
            let report = engine.reconcile().await.or_raise(|| ErrorKind::Backup)?;
            for info in &report.orphan_files {
                println!("orphan file\t{}\t{}", info.path.display(), info.size);
            }
            for record in &report.phantom_records {
                println!("missing file\t{}\t{}", record.file_path.display(), record.id);
            }
            for mismatch in &report.size_mismatches {
                println!(
                    "size mismatch\t{}\t{} != {}",
                    mismatch.record.file_path.display(),
                    mismatch.record.size,
                    mismatch.actual
                );
            }
            if !report.is_consistent() {
                exn::bail!(ErrorKind::Incomplete("storage and metadata disagree".to_string()));
            }
        },
    }
    Ok(())
}

async fn read_upload(file: &Path, content_type: Option<&str>) -> Result<Upload> {
    let data = tokio::fs::read(file).await.or_raise(|| ErrorKind::Io(file.to_path_buf()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_raise(|| ErrorKind::Io(file.to_path_buf()))?;
    let content_type = match content_type {
        Some(content_type) => content_type.to_string(),
        None => mime_guess::from_path(file).first_or_octet_stream().to_string(),
    };
    Ok(Upload::new(file_name, content_type, data))
}

fn print_record(record: &FileRecord) {
    let uploaded = record.upload_date.format(&Rfc3339).unwrap_or_default();
    println!(
        "{}\t{}\t{}\t{}\t{}",
        record.id,
        record.file_path.display(),
        record.size,
        record.content_type,
        uploaded
    );
}
