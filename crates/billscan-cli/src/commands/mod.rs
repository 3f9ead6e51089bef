pub mod fields;
pub mod jobs;
pub mod process;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use log::debug;

use billscan::{load_config, Config, Database};

/// Loaded configuration and an open job store.
pub struct Context {
    pub config: Config,
    pub db: Database,
}

impl Context {
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => load_config(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => {
                debug!("No config file given, using defaults");
                Config::default()
            }
        };

        let db_path = config
            .resolve_database_path()
            .context("no home directory found; set database_path in the config")?;
        let db = Database::open(&db_path)
            .with_context(|| format!("opening database at {}", db_path.display()))?;

        Ok(Self { config, db })
    }

    pub fn upload_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.upload_directory)
    }

    pub fn export_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.export_directory)
    }
}
