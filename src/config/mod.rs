use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "INVOICE_STORE_";

/// Configuration for the invoice store
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Database file; relative paths are anchored at the executable's directory
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    /// Upper bound on pooled SQLite connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_file() -> PathBuf {
    PathBuf::from("invoices.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    /// Load configuration from `INVOICE_STORE_*` environment variables
    ///
    /// A `.env` file is read first if one exists.
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let config = envy::prefixed(ENV_PREFIX)
            .from_env::<Config>()
            .context("invalid INVOICE_STORE_* configuration")?;

        Ok(config)
    }

    /// Resolve the database file against the running executable's directory
    pub fn database_path(&self) -> Result<PathBuf> {
        let exe = std::env::current_exe().context("cannot locate the running executable")?;
        let base = exe
            .parent()
            .context("executable path has no parent directory")?;

        Ok(resolve_against(base, &self.database_file))
    }
}

fn resolve_against(base: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        base.join(file)
    }
}

/// Initialize environment variables and load configuration
pub fn init() -> Result<Config> {
    Config::load()
}
