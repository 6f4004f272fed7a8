//! # Configuration
//!
//! Settings are resolved with [`confique`], highest priority first:
//!
//! 1. **Environment variables**: `FORMULAPAD_DATA_DIR`, `FORMULAPAD_HISTORY_CAP`, ...
//! 2. **Config file**: `formulapad.toml` in the OS config directory (via
//!    `directories`), or an explicit path.
//! 3. **Compiled defaults**: the `#[config(default = ...)]` values below.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `data_dir` | OS data dir | Root of the database and slot files |
//! | `db_name` | `formulapad` | Database directory prefix |
//! | `history_cap` | `30` | Formula history entries kept |
//! | `dedup_window_secs` | `60` | Window in which repeated formulas are dropped |
//! | `snapshot_cap` | `20` | Undo snapshots kept |
//! | `storage_quota` | unset | Bytes reported as quota by `usage` |
//! | `recognition_url` | `http://localhost:8001` | Base URL of the recognition API |
//! | `offline` | `false` | Start in the offline state |

use crate::error::{FormulaPadError, Result};
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "formulapad.toml";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormulaPadConfig {
    #[config(env = "FORMULAPAD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[config(default = "formulapad", env = "FORMULAPAD_DB_NAME")]
    pub db_name: String,

    #[config(default = 30, env = "FORMULAPAD_HISTORY_CAP")]
    pub history_cap: usize,

    #[config(default = 60, env = "FORMULAPAD_DEDUP_WINDOW_SECS")]
    pub dedup_window_secs: i64,

    #[config(default = 20, env = "FORMULAPAD_SNAPSHOT_CAP")]
    pub snapshot_cap: usize,

    #[config(env = "FORMULAPAD_STORAGE_QUOTA")]
    pub storage_quota: Option<u64>,

    #[config(default = "http://localhost:8001", env = "FORMULAPAD_RECOGNITION_URL")]
    pub recognition_url: String,

    #[config(default = false, env = "FORMULAPAD_OFFLINE")]
    pub offline: bool,
}

// Mirrors the `#[config(default)]` values; a test keeps the two in step.
impl Default for FormulaPadConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_name: "formulapad".to_string(),
            history_cap: 30,
            dedup_window_secs: 60,
            snapshot_cap: 20,
            storage_quota: None,
            recognition_url: "http://localhost:8001".to_string(),
            offline: false,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "formulapad", "formulapad")
}

/// `formulapad.toml` in the OS config directory.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl FormulaPadConfig {
    /// Load from env and `file` (or the default config path). A missing file
    /// is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = file.map(Path::to_path_buf).or_else(default_config_path) {
            builder = builder.file(path);
        }
        builder
            .load()
            .map_err(|e| FormulaPadError::Config(e.to_string()))
    }

    /// Configured data directory, else the OS data directory, else `./.formulapad`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(".formulapad"))
    }

    /// Sample config file with every key and its default.
    pub fn template() -> String {
        confique::toml::template::<Self>(confique::toml::FormatOptions::default())
    }
}
