//! Errors surfaced by the command-line front end.

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not initialize logging")]
    Logging,
    #[display("could not open storage")]
    Storage,
    #[display("could not open metadata database")]
    Metadata,
    #[display("backup operation failed")]
    Backup,
    #[display("could not access {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// Some of the work was done, but not all of it.
    #[display("{_0}")]
    Incomplete(#[error(not(source))] String),
}
