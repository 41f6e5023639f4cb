use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::artifact::BackupArtifact;

/// Terminal outcome of a run. Ordered by severity so the final status is
/// the worst of the per-phase outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStatus {
    /// Every phase succeeded.
    Success,
    /// Snapshot or resume failed but the run completed.
    Partial,
    /// Fatal abort before resume.
    Failed,
}

impl RunStatus {
    pub fn worst(self, other: RunStatus) -> RunStatus {
        self.max(other)
    }

    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::Partial => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The orchestrator's states, in execution order. Transitions are strictly
/// sequential and forward-only; each phase runs at most once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Warning,
    Quiescing,
    Snapshotting,
    Resuming,
    Pruning,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Warning => "warning",
            Phase::Quiescing => "quiescing",
            Phase::Snapshotting => "snapshotting",
            Phase::Resuming => "resuming",
            Phase::Pruning => "pruning",
        };
        f.write_str(name)
    }
}

/// One execution instance. Mutated as phases complete, logged at the end,
/// then discarded; only its side effects persist.
#[derive(Debug, Clone)]
pub struct BackupRun {
    pub started: NaiveDateTime,
    pub world_paths: Vec<PathBuf>,
    pub artifact: Option<BackupArtifact>,
    pub status: RunStatus,
}

impl BackupRun {
    pub fn begin(started: NaiveDateTime, world_paths: Vec<PathBuf>) -> Self {
        Self {
            started,
            world_paths,
            artifact: None,
            status: RunStatus::Success,
        }
    }

    /// Degrade the run outcome; a run never recovers to a better status.
    pub fn degrade(&mut self, status: RunStatus) {
        self.status = self.status.worst(status);
    }
}
