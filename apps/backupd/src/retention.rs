use backup_core::retention::deletion_candidates;
use backup_core::{BackupArtifact, RetentionPolicy};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::orchestrator::ArtifactStore;

/// Delete everything the policy condemns. Each deletion is independent: a
/// failure is logged per-artifact and the remaining candidates are still
/// attempted; nothing here ever escalates to a run failure. Returns the
/// artifacts actually removed.
pub async fn enforce<S: ArtifactStore>(
    store: &S,
    policy: RetentionPolicy,
    now: NaiveDateTime,
) -> Vec<BackupArtifact> {
    if policy.is_disabled() {
        debug!("retention disabled, keeping all backups");
        return Vec::new();
    }

    let artifacts = match store.list_artifacts().await {
        Ok(artifacts) => artifacts,
        Err(err) => {
            warn!("could not enumerate existing backups: {err:#}");
            return Vec::new();
        }
    };

    let mut deleted = Vec::new();
    for artifact in deletion_candidates(&artifacts, policy, now) {
        match store.delete_artifact(&artifact).await {
            Ok(()) => {
                info!(path = %artifact.path.display(), "pruned backup");
                deleted.push(artifact);
            }
            Err(err) => {
                warn!(path = %artifact.path.display(), "failed to prune backup: {err:#}");
            }
        }
    }
    deleted
}
