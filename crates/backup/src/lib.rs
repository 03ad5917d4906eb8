//! Backup storage engine.
//!
//! A backup is the set of files sharing a `backup_id`, stored underneath one
//! top-level directory of the storage root and indexed in the metadata store.
//! There is no backup entity of its own: [`BackupStorage`] derives backups
//! from the files and records that exist.

mod engine;
pub mod error;
mod names;
mod reconcile;
mod transfer;

pub use crate::engine::BackupStorage;
pub use crate::reconcile::{Reconciliation, SizeMismatch};
pub use crate::transfer::{BatchFailure, BatchOutcome, Download, Upload};
pub use tokio_util::sync::CancellationToken;
