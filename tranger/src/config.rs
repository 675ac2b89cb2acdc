//! Configuration for the TimeRanger tools.
//!
//! Root path resolution order:
//! 1. Explicit path passed on the command line
//! 2. TRANGER_PATH environment variable
//! 3. `path` in config.toml
//!
//! config.toml location: TRANGER_CONFIG, else the platform config directory.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::schema::TrangerDesc;
use crate::{Error, Result};

/// Environment variable naming the default TimeRanger root.
pub const TRANGER_PATH_VAR: &str = "TRANGER_PATH";

/// Environment variable naming an explicit config file.
pub const TRANGER_CONFIG_VAR: &str = "TRANGER_CONFIG";

/// Tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default TimeRanger root used when no path is given.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Filename mask recorded in newly created databases.
    #[serde(default = "default_filename_mask")]
    pub filename_mask: String,

    /// File permission for newly created files.
    #[serde(default = "default_rpermission")]
    pub rpermission: u32,

    /// Permission for newly created directories.
    #[serde(default = "default_xpermission")]
    pub xpermission: u32,
}

fn default_filename_mask() -> String {
    "%Y-%m-%d".to_string()
}

fn default_rpermission() -> u32 {
    0o660
}

fn default_xpermission() -> u32 {
    0o770
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            filename_mask: default_filename_mask(),
            rpermission: default_rpermission(),
            xpermission: default_xpermission(),
        }
    }
}

impl Config {
    /// Load config from the standard location, or defaults when there is none.
    pub fn load() -> Result<Self> {
        match config_file_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file. A missing file yields defaults.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the TimeRanger root: explicit path, then TRANGER_PATH, then config.
    pub fn resolve_path(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(TRANGER_PATH_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        self.path.clone()
    }

    /// Database descriptor used when creating a new database.
    pub fn database_desc(&self, database: &str) -> TrangerDesc {
        TrangerDesc {
            database: database.to_string(),
            filename_mask: self.filename_mask.clone(),
            rpermission: self.rpermission,
            xpermission: self.xpermission,
        }
    }
}

/// Locate config.toml: TRANGER_CONFIG, then the platform config directory.
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(TRANGER_CONFIG_VAR) {
        return Some(PathBuf::from(path));
    }
    ProjectDirs::from("", "", "tranger").map(|dirs| dirs.config_dir().join("config.toml"))
}
