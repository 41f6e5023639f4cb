use chrono::{Duration as ChronoDuration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::artifact::BackupArtifact;

/// Two independent limits over the set of retained archives. Zero disables
/// a rule; with both rules disabled nothing is ever deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Keep at most this many newest archives.
    #[serde(default)]
    pub max_backups: usize,
    /// Keep no archive older than this many days.
    #[serde(default)]
    pub max_days: u64,
}

impl RetentionPolicy {
    pub fn is_disabled(&self) -> bool {
        self.max_backups == 0 && self.max_days == 0
    }
}

/// Compute which artifacts the policy condemns, newest-first.
///
/// An artifact is a candidate if it violates EITHER active rule: beyond the
/// count limit, or older than the age limit. An artifact inside both limits
/// is never returned.
pub fn deletion_candidates(
    artifacts: &[BackupArtifact],
    policy: RetentionPolicy,
    now: NaiveDateTime,
) -> Vec<BackupArtifact> {
    if policy.is_disabled() {
        return Vec::new();
    }

    let mut sorted: Vec<BackupArtifact> = artifacts.to_vec();
    sorted.sort_by(|a, b| b.created.cmp(&a.created));

    let cutoff = if policy.max_days > 0 {
        Some(now - ChronoDuration::days(policy.max_days as i64))
    } else {
        None
    };

    sorted
        .into_iter()
        .enumerate()
        .filter(|(index, artifact)| {
            let beyond_count = policy.max_backups > 0 && *index >= policy.max_backups;
            let too_old = cutoff.is_some_and(|cutoff| artifact.created < cutoff);
            beyond_count || too_old
        })
        .map(|(_, artifact)| artifact)
        .collect()
}
