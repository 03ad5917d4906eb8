//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Configuration could not be parsed or merged
    #[display("could not parse configuration")]
    Parse,
    /// A value parsed fine but can't be used
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}
