//! Configuration loaded from `config.toml`.
//!
//! Lookup order: explicit `--config` path, then `$SEARCHDB_CONFIG`, then
//! `<config_dir>/searchdb/config.toml`. A missing file yields the defaults.

use crate::database::DatabaseFlags;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "SEARCHDB_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file. Defaults to `<data_dir>/searchdb/database.json`.
    pub path: Option<PathBuf>,
    pub case_sensitive: bool,
    pub index_variations: bool,
    pub skip_common_words: bool,
    pub index_document_name: bool,
}

impl DatabaseConfig {
    pub fn flags(&self) -> DatabaseFlags {
        let mut flags = DatabaseFlags::empty();
        flags.set(DatabaseFlags::CASE_SENSITIVE, self.case_sensitive);
        flags.set(DatabaseFlags::DO_NOT_INDEX_VARIATIONS, !self.index_variations);
        flags.set(DatabaseFlags::SKIP_COMMON_WORDS, self.skip_common_words);
        flags.set(DatabaseFlags::INDEX_DOCUMENT_NAME, self.index_document_name);
        flags
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            case_sensitive: false,
            index_variations: true,
            skip_common_words: false,
            index_document_name: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, or return defaults if absent.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SearchError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("searchdb").join("config.toml"))
    }

    pub fn flags(&self) -> DatabaseFlags {
        self.database.flags()
    }

    /// Resolve the database file: CLI override, then config, then the data dir.
    pub fn resolve_database_path(&self, cli_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli_path {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join("searchdb").join("database.json"))
            .ok_or_else(|| {
                SearchError::ConfigError("No database path configured and no data directory found".to_string())
            })
    }
}
