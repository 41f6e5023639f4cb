use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

/// Archive names carry their own creation timestamp so ordering and age
/// survive copies and replication; filesystem mtimes are never consulted.
pub const ARCHIVE_PREFIX: &str = "world_backup_";
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("not a backup archive name: {0}")]
    ForeignName(String),

    #[error("invalid timestamp in archive name {name}: {source}")]
    BadTimestamp {
        name: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One completed snapshot under the backup root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub created: NaiveDateTime,
    pub size: u64,
}

impl BackupArtifact {
    /// Build an artifact from its on-disk path, deriving the creation time
    /// from the canonical name. Returns an error for files that are not
    /// backup archives (lock files, manifests, unrelated clutter).
    pub fn from_path(path: PathBuf, size: u64) -> Result<Self, ArtifactError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let created = parse_archive_name(&name)?;
        Ok(Self { path, created, size })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Canonical archive file name for a run started at `started`.
pub fn archive_name(started: NaiveDateTime) -> String {
    format!(
        "{ARCHIVE_PREFIX}{}{ARCHIVE_SUFFIX}",
        started.format(TIMESTAMP_FORMAT)
    )
}

/// Parse the creation timestamp out of a canonical archive name.
pub fn parse_archive_name(name: &str) -> Result<NaiveDateTime, ArtifactError> {
    let stamp = name
        .strip_prefix(ARCHIVE_PREFIX)
        .and_then(|rest| rest.strip_suffix(ARCHIVE_SUFFIX))
        .ok_or_else(|| ArtifactError::ForeignName(name.to_string()))?;

    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).map_err(|source| {
        ArtifactError::BadTimestamp {
            name: name.to_string(),
            source,
        }
    })
}

/// Whether a directory entry name looks like one of our archives at all.
pub fn is_archive_name(name: &str) -> bool {
    name.starts_with(ARCHIVE_PREFIX) && name.ends_with(ARCHIVE_SUFFIX)
}

pub fn archive_path(backup_dir: &Path, started: NaiveDateTime) -> PathBuf {
    backup_dir.join(archive_name(started))
}
