use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use backup_docker::DockerCli;

use crate::orchestrator::{ServerChannel, ServerLifecycle};

/// The live collaborator: a containerized server reached through the
/// docker CLI. Player-visible text goes through the in-game `say` command.
pub struct DockerServer {
    cli: DockerCli,
}

impl DockerServer {
    pub fn new(container: String, stop_timeout: Duration) -> Self {
        Self {
            cli: DockerCli::new(container, stop_timeout),
        }
    }
}

#[async_trait]
impl ServerChannel for DockerServer {
    async fn notify(&self, message: &str) -> Result<()> {
        self.cli
            .send_command(&format!("say {message}"))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ServerLifecycle for DockerServer {
    async fn quiesce(&self) -> Result<()> {
        // One final notice to anyone still online; losing it does not
        // block the stop.
        let _ = self.notify("Server is shutting down for backup!").await;
        self.cli.stop_and_wait().await
    }

    async fn resume(&self) -> Result<()> {
        self.cli.start().await
    }
}
