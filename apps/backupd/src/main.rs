use std::path::PathBuf;

use anyhow::Context;
use backup_core::WarningSchedule;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod lock;
mod notify;
mod orchestrator;
mod retention;
mod server;
mod snapshot;

use orchestrator::ServerLifecycle;

#[derive(Parser)]
#[command(name = "backupd")]
#[command(about = "Scheduled world backup orchestrator for containerized game servers", long_about = None)]
struct Cli {
    /// Path to the backup configuration file
    #[arg(short, long, default_value = "backup.toml")]
    config: PathBuf,
    /// Send a single test notification and exit without touching the
    /// server or storage
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::BackupConfig::load(&cli.config).await?;

    let server = server::DockerServer::new(config.container_name.clone(), config.stop_timeout());

    if cli.dry_run || config.dry_run {
        match orchestrator::dry_run(&server).await {
            Ok(()) => {
                info!("dry run: notification channel is reachable");
                return Ok(());
            }
            Err(err) => {
                error!("dry run: notification channel unreachable: {err:#}");
                std::process::exit(1);
            }
        }
    }

    tokio::fs::create_dir_all(&config.backup_dir)
        .await
        .with_context(|| format!("failed to create backup dir {}", config.backup_dir.display()))?;

    // One run per container/backup-root pair; a concurrent trigger must
    // never interleave quiesce/snapshot/resume against the same server.
    let _guard = match lock::acquire(&config.backup_dir.join("backupd.lock")) {
        Ok(guard) => guard,
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
            error!("another backup run is already active for this backup root");
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let marker = orchestrator::QuiesceMarker::new(&config.backup_dir);
    if marker.exists().await {
        error!("a previous run left the server stopped; restarting it instead of taking a backup");
        match server.resume().await {
            Ok(()) => {
                marker.clear().await;
                warn!("server restarted; trigger a new run for the missed backup");
            }
            Err(err) => {
                error!("could not restart the server, operator intervention required: {err:#}");
            }
        }
        std::process::exit(1);
    }

    let plan = orchestrator::RunPlan {
        schedule: WarningSchedule::from_minutes(&config.warnings),
        world_paths: config.world_paths.clone(),
        policy: config.retention,
    };
    let store = snapshot::Snapshotter::new(config.backup_dir.clone());
    let driver = orchestrator::Orchestrator::new(server, store, marker);

    let run = driver.run(plan).await;
    match &run.artifact {
        Some(artifact) => {
            info!(status = %run.status, path = %artifact.path.display(), "backup run finished")
        }
        None => warn!(status = %run.status, "backup run finished without an artifact"),
    }
    std::process::exit(run.status.exit_code());
}
