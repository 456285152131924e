use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Chat client log file to watch
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Seconds between refreshes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Write diagnostics here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// `<user-data-root>/Microsoft/Teams/logs.txt`; the roaming AppData folder on Windows
fn default_log_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
        .join("Microsoft/Teams/logs.txt")
}

fn default_poll_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            poll_interval_secs: default_poll_interval(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load the config file, writing the defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            if let Err(e) = config.save() {
                tracing::warn!("Failed to save default config: {}", e);
            }
            Ok(config)
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        Ok(config)
    }

    /// ~/.config/presence-watchdog/config.toml
    pub fn config_path() -> Result<PathBuf> {
        let base_dirs = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))?;
        Ok(base_dirs.home_dir().join(".config/presence-watchdog/config.toml"))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Reject settings the watchdog would refuse at start
    pub fn validate(&self) -> Result<()> {
        if self.log_path.as_os_str().is_empty() {
            anyhow::bail!("log_path must not be empty");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.log_path.ends_with("Microsoft/Teams/logs.txt"));
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.log_level, "info");
        assert!(config.log_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = 5\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.log_path, default_log_path());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = Config {
            log_path: PathBuf::from("/var/log/teams/logs.txt"),
            poll_interval_secs: 12,
            log_level: "debug".to_string(),
            log_file: Some(PathBuf::from("/tmp/watchdog.log")),
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = \"often\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log_path = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
