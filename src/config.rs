//! Runtime configuration
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Browser-like user agent sent with page and asset requests
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClonerConfig {
    /// Root directory that receives one folder per clone
    pub output_dir: PathBuf,
    /// Per-asset download timeout
    pub asset_timeout_secs: u64,
    /// Upper bound for producing the page snapshot
    pub render_timeout_secs: u64,
    /// Maximum downloads in flight within one job
    pub max_concurrent: usize,
    pub user_agent: String,
    /// Address the HTTP API binds to
    pub listen_addr: String,
    pub cors_enabled: bool,
}

impl Default for ClonerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            asset_timeout_secs: 10,
            render_timeout_secs: 60,
            max_concurrent: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
            cors_enabled: true,
        }
    }
}

impl ClonerConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.asset_timeout_secs == 0 || self.render_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_secs(self.asset_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClonerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.asset_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_concurrent, 8);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("cloner.toml");
        std::fs::write(&path, "output_dir = \"/srv/clones\"\nmax_concurrent = 2\n").unwrap();

        let config = ClonerConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/clones"));
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.asset_timeout_secs, 10);
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("cloner.toml");
        std::fs::write(&path, "max_concurrent = \"lots\"").unwrap();

        let err = ClonerConfig::from_toml_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = ClonerConfig::from_toml_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = ClonerConfig {
            max_concurrent: 0,
            ..ClonerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
