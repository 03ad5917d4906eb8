//! Layered configuration for savesync.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults (data stored in the platform data directory)
//! 2. A TOML file: the one passed explicitly, or `savesync.toml` in the
//!    platform config directory if it exists
//! 3. Environment variables prefixed with `SAVESYNC_`, nested with `__`
//!    (e.g. `SAVESYNC_STORAGE__ROOT=/srv/saves`)
//!
//! ```toml
//! [storage]
//! root = "/srv/savesync/storage"
//!
//! [metadata]
//! database = "/srv/savesync/metadata.db"
//! max_connections = 5
//!
//! [log]
//! filter = "info,sqlx=warn"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "SAVESYNC_";
const CONFIG_FILE: &str = "savesync.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory every backup is stored underneath. Created on startup.
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// SQLite database file. Created on startup.
    pub database: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins over this.
    pub filter: String,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "savesync")
}

impl Default for Config {
    fn default() -> Self {
        let data = project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("data"));
        Self {
            storage: StorageConfig {
                root: data.join("storage"),
            },
            metadata: MetadataConfig {
                database: data.join("metadata.db"),
                max_connections: 5,
            },
            log: LogConfig {
                filter: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from every source.
    ///
    /// An explicit `file` must exist; the default config file is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        if let Some(file) = file
            && !file.is_file()
        {
            exn::bail!(ErrorKind::NotFound(file.to_path_buf()));
        }
        Self::from_figment(Self::figment(file))
    }

    /// All configuration sources, merged in priority order.
    pub fn figment(file: Option<&Path>) -> Figment {
        let file = file
            .map(Path::to_path_buf)
            .or_else(|| project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE)));
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            tracing::debug!(file = %file.display(), "reading configuration file");
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.root.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("storage.root must not be empty"));
        }
        if self.metadata.database.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("metadata.database must not be empty"));
        }
        if self.metadata.max_connections == 0 {
            exn::bail!(ErrorKind::Invalid("metadata.max_connections must be greater than 0"));
        }
        Ok(())
    }
}
