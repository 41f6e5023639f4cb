use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use backup_core::artifact::{self, BackupArtifact};
use chrono::NaiveDateTime;
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::task;
use tracing::warn;

use crate::orchestrator::ArtifactStore;

/// Materializes and enumerates tar.gz archives under one backup root.
pub struct Snapshotter {
    backup_dir: PathBuf,
}

impl Snapshotter {
    pub fn new(backup_dir: PathBuf) -> Self {
        Self { backup_dir }
    }
}

#[async_trait]
impl ArtifactStore for Snapshotter {
    /// One archive per run aggregating every world path, named from the
    /// run's start timestamp. Heavy I/O runs on a blocking thread. The
    /// server must already be quiesced; archiving a world that is still
    /// being written is undefined.
    async fn create_snapshot(
        &self,
        world_paths: &[PathBuf],
        started: NaiveDateTime,
    ) -> Result<BackupArtifact> {
        for path in world_paths {
            if !path.exists() {
                bail!("world path {} does not exist", path.display());
            }
        }

        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .with_context(|| {
                format!("failed to create backup dir {}", self.backup_dir.display())
            })?;

        let archive_path = artifact::archive_path(&self.backup_dir, started);
        let paths = world_paths.to_vec();
        let dest = archive_path.clone();
        task::spawn_blocking(move || -> Result<()> {
            let file = fs::File::create(&dest)
                .with_context(|| format!("failed to create {}", dest.display()))?;
            let encoder = GzEncoder::new(file, Compression::default());
            let mut tar = tar::Builder::new(encoder);

            for path in &paths {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        anyhow::anyhow!("world path {} has no final component", path.display())
                    })?;
                if path.is_dir() {
                    tar.append_dir_all(&name, path)?;
                } else {
                    tar.append_path_with_name(path, &name)?;
                }
            }

            tar.finish()?;
            Ok(())
        })
        .await
        .context("snapshot task panicked")??;

        let size = tokio::fs::metadata(&archive_path).await?.len();
        let artifact = BackupArtifact::from_path(archive_path, size)?;
        Ok(artifact)
    }

    async fn list_artifacts(&self) -> Result<Vec<BackupArtifact>> {
        let mut entries = tokio::fs::read_dir(&self.backup_dir)
            .await
            .with_context(|| format!("failed to read {}", self.backup_dir.display()))?;

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !artifact::is_archive_name(&name) {
                continue;
            }
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            match BackupArtifact::from_path(entry.path(), size) {
                Ok(found) => artifacts.push(found),
                Err(err) => warn!("skipping unreadable archive name {name}: {err}"),
            }
        }
        Ok(artifacts)
    }

    async fn delete_artifact(&self, artifact: &BackupArtifact) -> Result<()> {
        tokio::fs::remove_file(&artifact.path)
            .await
            .with_context(|| format!("failed to delete {}", artifact.path.display()))
    }
}
