//! Application configuration

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_FILE_NAME, DATA_DIR_NAME, DEFAULT_HISTORY_CAPACITY, DEFAULT_LOG_FILE,
    DEFAULT_SIDEBAR_WIDTH, DEFAULT_TIMEOUT_SECS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deadline for a whole exchange, body included
    pub request_timeout_secs: u64,
    /// Entries kept per request before the oldest is evicted
    pub history_capacity: usize,
    /// Relative paths are taken from the data directory
    pub log_file: String,
    pub log_level: String,
    pub sidebar_width: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            log_file: DEFAULT_LOG_FILE.to_string(),
            log_level: "info".to_string(),
            sidebar_width: DEFAULT_SIDEBAR_WIDTH,
        }
    }
}

impl Config {
    /// Load `config.yaml` from `data_dir`. A missing file gives defaults.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        // An empty file is valid and means "all defaults"
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn log_path(&self, data_dir: &Path) -> PathBuf {
        let path = PathBuf::from(&self.log_file);
        if path.is_absolute() {
            path
        } else {
            data_dir.join(path)
        }
    }

    /// Max tracing level; unknown names fall back to `info`
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

/// `~/.courier`, or `./.courier` when no home directory is known
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "request_timeout_secs: 3\nlog_level: debug\n").unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "history_capacity: lots\n").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_log_path_is_relative_to_data_dir() {
        let config = Config::default();
        let dir = Path::new("/tmp/courier-data");
        assert_eq!(config.log_path(dir), dir.join(DEFAULT_LOG_FILE));
        assert_eq!(Config { log_level: "loud".into(), ..Config::default() }.tracing_level(), tracing::Level::INFO);
    }
}
