use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use backup_core::RetentionPolicy;
use serde::Deserialize;
use tokio::fs;

fn default_stop_timeout_secs() -> u64 {
    120
}

/// Operator-supplied configuration, loaded once at startup and passed
/// explicitly to every component.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Name of the container running the server.
    pub container_name: String,
    /// Absolute paths of the world data to capture.
    pub world_paths: Vec<PathBuf>,
    /// Where archives are written; created if absent.
    pub backup_dir: PathBuf,
    /// Pre-shutdown warning offsets, in minutes.
    #[serde(default)]
    pub warnings: Vec<u64>,
    /// How long to wait for the container to exit during quiesce.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Only exercise the notification channel, then exit.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl BackupConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.container_name.trim().is_empty() {
            bail!("container_name must not be empty");
        }
        if self.world_paths.is_empty() {
            bail!("world_paths must list at least one path");
        }
        for path in &self.world_paths {
            if !path.is_absolute() {
                bail!("world path {} must be absolute", path.display());
            }
        }
        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}
