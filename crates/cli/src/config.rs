use anyhow::{Context, Result};
use orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "discovery.toml";
const DEFAULT_CHECKPOINT_DIR: &str = ".discovery/checkpoints";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of `discovery.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub orchestrator: OrchestratorConfig,
    pub checkpoint: CheckpointConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// Read the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = DiscoveryConfig::load(&temp.path().join(DEFAULT_CONFIG_FILE))
            .await
            .unwrap();
        assert_eq!(config, DiscoveryConfig::default());
        assert_eq!(config.orchestrator.max_retries, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(DEFAULT_CONFIG_FILE);
        let mut config = DiscoveryConfig::default();
        config.orchestrator.max_retries = 5;
        config.checkpoint.dir = PathBuf::from("/tmp/discovery");

        config.write(&path).await.unwrap();
        let loaded = DiscoveryConfig::load(&path).await.unwrap();

        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "[orchestrator]\nmax_retries = 1\n\n[orchestrator.thresholds]\nsearch_warn = 0.4\n",
        )
        .unwrap();

        let config = DiscoveryConfig::load(&path).await.unwrap();

        assert_eq!(config.orchestrator.max_retries, 1);
        assert_eq!(config.orchestrator.thresholds.search_warn, 0.4);
        assert_eq!(config.orchestrator.collaborator_timeout_secs, 60);
        assert_eq!(config.checkpoint, CheckpointConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[orchestrator\nmax_retries = ").unwrap();

        let err = DiscoveryConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
