use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use waypoint_engine::constants::log_sink::{MAX_LINES, PRUNE_BATCH};

const CONFIG_FILE: &str = "config.json";

/// Shared log sink retention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Lines kept before the oldest batch is pruned
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Lines dropped per prune
    #[serde(default = "default_prune_batch")]
    pub prune_batch: usize,
}

fn default_max_lines() -> usize {
    MAX_LINES
}

fn default_prune_batch() -> usize {
    PRUNE_BATCH
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_lines: MAX_LINES,
            prune_batch: PRUNE_BATCH,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("waypoint/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file, relative to the config directory unless absolute
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("workflows.db")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log: LogConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, or defaults if none is saved
    pub async fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).await?;

        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration to disk
    pub async fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(config_dir).await?;

        let config_path = config_dir.join(CONFIG_FILE);
        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        fs::write(&config_path, contents).await?;

        log::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    /// Database location resolved against the config directory
    pub fn database_path_in(&self, config_dir: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            config_dir.join(&self.database_path)
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.log.max_lines, 10_000);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.log.prune_batch = 50;
        config.http.user_agent = "tests".to_string();

        config.save(dir.path()).await.unwrap();
        let loaded = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"database_path": "/tmp/w.db"}"#).unwrap();

        let config = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/w.db"));
        assert_eq!(config.database_path_in(dir.path()), PathBuf::from("/tmp/w.db"));
        assert_eq!(config.http, HttpConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();

        let err = AppConfig::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
