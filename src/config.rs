//! Runtime settings. Command-line flags win over environment variables, which
//! win over the defaults under `~/.library-catalog/`.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Parser;
use directories::BaseDirs;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".library-catalog";
/// Binary catalog file stored inside the application data directory.
const DATA_FILE_NAME: &str = "library_data.bin";
/// Log file stored next to the catalog; the TUI owns the terminal.
const LOG_FILE_NAME: &str = "catalog.log";

pub const DATA_FILE_ENV: &str = "LIBRARY_CATALOG_DATA";
pub const LOG_FILE_ENV: &str = "LIBRARY_CATALOG_LOG";

/// Terminal catalog manager for a personal book collection.
#[derive(Debug, Parser)]
#[command(name = "library-catalog", version, about)]
pub struct Cli {
    /// Binary catalog file to load on start and save on exit.
    #[arg(long, value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// Directory that relative CSV export and import names resolve against.
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Where log lines are written.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Fully resolved paths and options the rest of the program runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_file: PathBuf,
    pub export_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
}

impl Settings {
    /// Resolve settings from parsed flags, the process environment and the
    /// user's home directory.
    pub fn resolve(cli: Cli) -> Result<Self> {
        let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
        let data_dir = base_dirs.home_dir().join(DATA_DIR_NAME);
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Ok(Self::from_parts(
            cli,
            &data_dir,
            &current_dir,
            env::var_os(DATA_FILE_ENV).map(PathBuf::from),
            env::var_os(LOG_FILE_ENV).map(PathBuf::from),
        ))
    }

    fn from_parts(
        cli: Cli,
        data_dir: &Path,
        current_dir: &Path,
        data_env: Option<PathBuf>,
        log_env: Option<PathBuf>,
    ) -> Self {
        Self {
            data_file: cli
                .data_file
                .or(data_env)
                .unwrap_or_else(|| data_dir.join(DATA_FILE_NAME)),
            export_dir: cli.export_dir.unwrap_or_else(|| current_dir.to_path_buf()),
            log_file: cli
                .log_file
                .or(log_env)
                .unwrap_or_else(|| data_dir.join(LOG_FILE_NAME)),
            log_level: cli.log_level,
        }
    }

    /// Turn a user-typed export or import name into a path: `.csv` is
    /// appended unless the name already ends in that extension, and relative
    /// names land in `export_dir`. Blank names are rejected.
    pub fn csv_path(&self, name: &str) -> Result<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("A file name is required."));
        }
        let mut path = PathBuf::from(name);
        if !path.extension().is_some_and(|ext| ext == "csv") {
            path = PathBuf::from(format!("{name}.csv"));
        }
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.export_dir.join(path))
        }
    }
}
