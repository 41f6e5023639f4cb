use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

/// Thin wrapper over the docker CLI for one named container. In-game
/// commands go through `docker exec <container> rcon-cli <command>`;
/// lifecycle goes through `docker start`/`docker stop`/`docker wait`.
pub struct DockerCli {
    container: String,
    stop_timeout: Duration,
}

impl DockerCli {
    pub fn new(container: String, stop_timeout: Duration) -> Self {
        Self {
            container,
            stop_timeout,
        }
    }

    /// Deliver an in-game console command via the container's rcon-cli.
    pub async fn send_command(&self, command: &str) -> Result<String> {
        self.run(&["exec", &self.container, "rcon-cli", command])
            .await
            .with_context(|| format!("rcon command {command:?} failed"))
    }

    /// Ask the server to shut down and block until the container exits or
    /// the stop timeout elapses. Falls back to `docker stop` when the
    /// console command cannot be delivered.
    pub async fn stop_and_wait(&self) -> Result<()> {
        if let Err(err) = self.send_command("stop").await {
            warn!("in-game stop failed, falling back to docker stop: {err:#}");
            let secs = self.stop_timeout.as_secs().to_string();
            self.run(&["stop", "-t", &secs, &self.container]).await?;
            return Ok(());
        }

        let wait_args = ["wait", self.container.as_str()];
        let wait = self.run(&wait_args);
        match timeout(self.stop_timeout, wait).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => bail!(
                "container {} did not exit within {}s",
                self.container,
                self.stop_timeout.as_secs()
            ),
        }
    }

    pub async fn start(&self) -> Result<()> {
        self.run(&["start", &self.container]).await.map(|_| ())
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("docker")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to spawn docker {}", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "docker {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
