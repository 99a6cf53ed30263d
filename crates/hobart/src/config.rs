//! Run configuration.
//!
//! Stored as pretty-printed JSON. Every field has a default, so a config file only needs
//! to list what it changes.

use crate::error::{HobartError, Result};
use chrono::NaiveDate;
use hobart_compositor::IndexCompositionPolicy;
use hobart_compositor::beta::{DEFAULT_MIN_OBSERVATIONS, DEFAULT_WINDOW_DAYS};
use hobart_data::SqliteStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the config inside the data directory.
pub const CONFIG_FILE: &str = "hobart.json";

/// Default data directory.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/hobart/`
/// - macOS: `~/Library/Caches/hobart/`
/// - Windows: `%LOCALAPPDATA%\hobart\`
pub fn default_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hobart")
}

fn first_limit_move_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1999, 5, 4).unwrap_or(NaiveDate::MIN)
}

/// Rolling beta settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetaSettings {
    /// Id of the market return series in the `custom_index` table
    pub market_id: String,
    /// Lookback in calendar days
    pub window_days: u64,
    /// Minimum aligned observations per estimate
    pub min_observations: usize,
}

impl Default for BetaSettings {
    fn default() -> Self {
        Self {
            market_id: "H00001".to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
        }
    }
}

/// Everything a pipeline run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HobartConfig {
    /// SQLite table store
    pub database: PathBuf,
    /// Accounting-date cache file
    pub date_cache: PathBuf,
    /// First date of the limit-move detector on an empty store
    pub limit_move_start: NaiveDate,
    /// Custom indexes to maintain
    pub indexes: Vec<IndexCompositionPolicy>,
    /// Rolling beta settings
    pub beta: BetaSettings,
}

impl Default for HobartConfig {
    fn default() -> Self {
        Self::in_dir(&default_dir())
    }
}

impl HobartConfig {
    /// Default config keeping the store and cache under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            database: dir.join("hobart.db"),
            date_cache: dir.join("date_cache.json.gz"),
            limit_move_start: first_limit_move_date(),
            indexes: Vec::new(),
            beta: BetaSettings::default(),
        }
    }

    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| HobartError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Read a config file, or the defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Write the config, creating its directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_error = |source| HobartError::Config {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(config_error)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload).map_err(config_error)
    }

    /// Open the table store, creating its directory.
    pub fn open_store(&self) -> Result<SqliteStore> {
        if let Some(parent) = self.database.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| HobartError::Config {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(SqliteStore::new(&self.database)?)
    }
}
