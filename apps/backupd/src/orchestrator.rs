use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use backup_core::{BackupArtifact, BackupRun, Phase, RetentionPolicy, RunStatus, WarningSchedule};
use chrono::{Local, NaiveDateTime};
use tracing::{error, info, warn};

use crate::{notify, retention};

#[async_trait]
pub trait ServerChannel {
    /// Deliver a human-readable message to players. Best-effort.
    async fn notify(&self, message: &str) -> Result<()>;
}

#[async_trait]
pub trait ServerLifecycle {
    /// Stop the server and block until its on-disk state is quiet.
    async fn quiesce(&self) -> Result<()>;
    /// Start the server again.
    async fn resume(&self) -> Result<()>;
}

#[async_trait]
pub trait ArtifactStore {
    async fn create_snapshot(
        &self,
        world_paths: &[PathBuf],
        started: NaiveDateTime,
    ) -> Result<BackupArtifact>;
    async fn list_artifacts(&self) -> Result<Vec<BackupArtifact>>;
    async fn delete_artifact(&self, artifact: &BackupArtifact) -> Result<()>;
}

/// Marks the window in which the server is known to be stopped. A marker
/// that survives process death means the server may still be down, and the
/// next invocation must handle that before taking a new backup.
pub struct QuiesceMarker {
    path: PathBuf,
}

impl QuiesceMarker {
    pub fn new(backup_dir: &Path) -> Self {
        Self {
            path: backup_dir.join("backupd.quiesced"),
        }
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    pub async fn set(&self) {
        let stamp = Local::now().to_rfc3339();
        if let Err(err) = tokio::fs::write(&self.path, stamp).await {
            warn!("could not write quiesce marker: {err}");
        }
    }

    pub async fn clear(&self) {
        if let Err(err) = tokio::fs::remove_file(&self.path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove quiesce marker: {err}");
            }
        }
    }
}

/// Everything one run needs, derived from config before the run starts.
pub struct RunPlan {
    pub schedule: WarningSchedule,
    pub world_paths: Vec<PathBuf>,
    pub policy: RetentionPolicy,
}

/// Drives one run through its phases: warning, quiescing, snapshotting,
/// resuming, pruning. Transitions are strictly sequential and forward-only;
/// each phase executes at most once.
pub struct Orchestrator<S, A> {
    server: S,
    store: A,
    marker: QuiesceMarker,
}

impl<S, A> Orchestrator<S, A>
where
    S: ServerChannel + ServerLifecycle,
    A: ArtifactStore,
{
    pub fn new(server: S, store: A, marker: QuiesceMarker) -> Self {
        Self {
            server,
            store,
            marker,
        }
    }

    pub async fn run(&self, plan: RunPlan) -> BackupRun {
        let mut run = BackupRun::begin(Local::now().naive_local(), plan.world_paths);

        info!(phase = %Phase::Warning, warnings = plan.schedule.len(), "backup run started");
        notify::run_schedule(&self.server, &plan.schedule).await;

        info!(phase = %Phase::Quiescing, "stopping server for a consistent snapshot");
        if let Err(err) = self.server.quiesce().await {
            // The worlds may still be live; nothing has been touched, so
            // abort without snapshot, resume, or pruning.
            error!(phase = %Phase::Quiescing, "stop failed, aborting: {err:#}");
            run.degrade(RunStatus::Failed);
            return run;
        }
        self.marker.set().await;

        info!(phase = %Phase::Snapshotting, paths = run.world_paths.len(), "archiving world data");
        match self.store.create_snapshot(&run.world_paths, run.started).await {
            Ok(artifact) => {
                info!(
                    phase = %Phase::Snapshotting,
                    path = %artifact.path.display(),
                    size = artifact.size,
                    "snapshot created"
                );
                run.artifact = Some(artifact);
            }
            Err(err) => {
                error!(phase = %Phase::Snapshotting, "snapshot failed: {err:#}");
                run.degrade(RunStatus::Partial);
            }
        }

        info!(phase = %Phase::Resuming, "starting server");
        match self.server.resume().await {
            Ok(()) => self.marker.clear().await,
            Err(err) => {
                // The server is down, which outranks any backup problem.
                // The marker stays behind so the next invocation knows.
                error!(
                    phase = %Phase::Resuming,
                    "SERVER LEFT STOPPED, restart it manually: {err:#}"
                );
                run.degrade(RunStatus::Partial);
            }
        }

        info!(phase = %Phase::Pruning, "enforcing retention policy");
        let deleted =
            retention::enforce(&self.store, plan.policy, Local::now().naive_local()).await;
        info!(phase = %Phase::Pruning, deleted = deleted.len(), "retention pass finished");

        run
    }
}

/// Validate the notification channel against the live server and nothing
/// else. Takes only a channel, so it is unable to touch server lifecycle
/// or storage.
pub async fn dry_run<C: ServerChannel>(channel: &C) -> Result<()> {
    channel
        .notify("Backup dry run: notification check, nothing will happen.")
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use backup_core::Warning;
    use backup_core::artifact::archive_name;
    use chrono::Duration as ChronoDuration;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type CallLog = Arc<Mutex<Vec<String>>>;

    #[derive(Default)]
    struct ScriptedServer {
        log: CallLog,
        fail_notify: bool,
        fail_quiesce: bool,
        fail_resume: bool,
    }

    #[async_trait]
    impl ServerChannel for ScriptedServer {
        async fn notify(&self, message: &str) -> Result<()> {
            self.log.lock().unwrap().push(format!("notify:{message}"));
            if self.fail_notify {
                bail!("channel down");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ServerLifecycle for ScriptedServer {
        async fn quiesce(&self) -> Result<()> {
            self.log.lock().unwrap().push("quiesce".to_string());
            if self.fail_quiesce {
                bail!("container refused to stop");
            }
            Ok(())
        }

        async fn resume(&self) -> Result<()> {
            self.log.lock().unwrap().push("resume".to_string());
            if self.fail_resume {
                bail!("container refused to start");
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedStore {
        log: CallLog,
        fail_snapshot: bool,
        artifacts: Vec<BackupArtifact>,
    }

    #[async_trait]
    impl ArtifactStore for ScriptedStore {
        async fn create_snapshot(
            &self,
            _world_paths: &[PathBuf],
            started: NaiveDateTime,
        ) -> Result<BackupArtifact> {
            self.log.lock().unwrap().push("snapshot".to_string());
            if self.fail_snapshot {
                bail!("disk full");
            }
            Ok(BackupArtifact {
                path: PathBuf::from("/backups").join(archive_name(started)),
                created: started,
                size: 1,
            })
        }

        async fn list_artifacts(&self) -> Result<Vec<BackupArtifact>> {
            self.log.lock().unwrap().push("list".to_string());
            Ok(self.artifacts.clone())
        }

        async fn delete_artifact(&self, artifact: &BackupArtifact) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("delete:{}", artifact.file_name()));
            Ok(())
        }
    }

    struct Fixture {
        log: CallLog,
        server: ScriptedServer,
        store: ScriptedStore,
        marker_dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        Fixture {
            server: ScriptedServer {
                log: log.clone(),
                ..Default::default()
            },
            store: ScriptedStore {
                log: log.clone(),
                ..Default::default()
            },
            marker_dir: tempfile::tempdir().unwrap(),
            log,
        }
    }

    fn plan(schedule: WarningSchedule) -> RunPlan {
        RunPlan {
            schedule,
            world_paths: vec![PathBuf::from("/srv/mc/world")],
            policy: RetentionPolicy {
                max_backups: 5,
                max_days: 0,
            },
        }
    }

    fn schedule_ms(offsets: &[u64]) -> WarningSchedule {
        WarningSchedule::new(
            offsets
                .iter()
                .map(|&ms| Warning {
                    offset: Duration::from_millis(ms),
                    message: format!("{ms} left"),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn happy_path_runs_every_phase_in_order() {
        let f = fixture();
        let marker = QuiesceMarker::new(f.marker_dir.path());
        let orchestrator = Orchestrator::new(f.server, f.store, marker);

        let run = orchestrator.run(plan(schedule_ms(&[10, 5, 30]))).await;

        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.status.exit_code(), 0);
        assert!(run.artifact.is_some());

        let calls = f.log.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "notify:30 left",
                "notify:10 left",
                "notify:5 left",
                "quiesce",
                "snapshot",
                "resume",
                "list",
            ]
        );
        assert!(!orchestrator.marker.exists().await);
    }

    #[tokio::test]
    async fn quiesce_failure_aborts_before_touching_storage() {
        let mut f = fixture();
        f.server.fail_quiesce = true;
        let marker = QuiesceMarker::new(f.marker_dir.path());
        let orchestrator = Orchestrator::new(f.server, f.store, marker);

        let run = orchestrator.run(plan(WarningSchedule::default())).await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.status.exit_code(), 1);
        assert!(run.artifact.is_none());

        // No snapshot, no resume, no pruning, no marker.
        let calls = f.log.lock().unwrap().clone();
        assert_eq!(calls, vec!["quiesce"]);
        assert!(!orchestrator.marker.exists().await);
    }

    #[tokio::test]
    async fn snapshot_failure_still_resumes_and_prunes() {
        let mut f = fixture();
        f.store.fail_snapshot = true;
        let marker = QuiesceMarker::new(f.marker_dir.path());
        let orchestrator = Orchestrator::new(f.server, f.store, marker);

        let run = orchestrator.run(plan(WarningSchedule::default())).await;

        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.status.exit_code(), 2);
        assert!(run.artifact.is_none());

        let calls = f.log.lock().unwrap().clone();
        assert_eq!(calls, vec!["quiesce", "snapshot", "resume", "list"]);
        assert_eq!(calls.iter().filter(|c| *c == "resume").count(), 1);
    }

    #[tokio::test]
    async fn resume_failure_degrades_but_pruning_still_runs() {
        let mut f = fixture();
        f.server.fail_resume = true;
        let marker = QuiesceMarker::new(f.marker_dir.path());
        let orchestrator = Orchestrator::new(f.server, f.store, marker);

        let run = orchestrator.run(plan(WarningSchedule::default())).await;

        assert_eq!(run.status, RunStatus::Partial);
        assert!(run.artifact.is_some());

        let calls = f.log.lock().unwrap().clone();
        assert_eq!(calls, vec!["quiesce", "snapshot", "resume", "list"]);

        // The marker survives a failed resume so the next invocation can
        // tell the server was left stopped.
        assert!(orchestrator.marker.exists().await);
    }

    #[tokio::test]
    async fn warning_failures_never_degrade_the_run() {
        let mut f = fixture();
        f.server.fail_notify = true;
        let marker = QuiesceMarker::new(f.marker_dir.path());
        let orchestrator = Orchestrator::new(f.server, f.store, marker);

        let run = orchestrator.run(plan(schedule_ms(&[10, 5]))).await;

        assert_eq!(run.status, RunStatus::Success);
        let calls = f.log.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["notify:10 left", "notify:5 left", "quiesce", "snapshot", "resume", "list"]
        );
    }

    #[tokio::test]
    async fn dry_run_sends_exactly_one_message() {
        let f = fixture();

        dry_run(&f.server).await.unwrap();

        let calls = f.log.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("notify:"));
    }

    #[tokio::test]
    async fn pruning_deletes_through_the_store() {
        let mut f = fixture();
        let now = Local::now().naive_local();
        f.store.artifacts = (0..3)
            .map(|days| {
                let created = now - ChronoDuration::days(days + 1);
                BackupArtifact {
                    path: PathBuf::from("/backups").join(archive_name(created)),
                    created,
                    size: 1,
                }
            })
            .collect();
        let marker = QuiesceMarker::new(f.marker_dir.path());
        let orchestrator = Orchestrator::new(f.server, f.store, marker);

        let mut run_plan = plan(WarningSchedule::default());
        run_plan.policy = RetentionPolicy {
            max_backups: 1,
            max_days: 0,
        };
        let run = orchestrator.run(run_plan).await;

        assert_eq!(run.status, RunStatus::Success);
        let calls = f.log.lock().unwrap().clone();
        assert_eq!(calls.iter().filter(|c| c.starts_with("delete:")).count(), 2);
    }
}
