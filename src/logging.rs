//! Logging initialization.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use savesync_config::LogConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Build the filter: `RUST_LOG` if it is set, the configured directives
/// otherwise.
fn filter(configured: &str, env: Option<&str>) -> Result<EnvFilter> {
    let directives = env.filter(|env| !env.trim().is_empty()).unwrap_or(configured);
    EnvFilter::try_new(directives).or_raise(|| ErrorKind::Logging)
}

/// Install the global subscriber. Logs go to stderr so that `read` can
/// stream file contents to stdout.
pub fn init(config: &LogConfig) -> Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter(&config.filter, env.as_deref())?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .try_init()
        .or_raise(|| ErrorKind::Logging)
}
