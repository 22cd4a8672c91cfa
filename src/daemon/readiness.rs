use super::client::DockerCli;
use crate::error::{BootstrapError, Result};
use crate::process::{CommandRunner, Exit};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Polls a daemon endpoint with `docker info` until it answers.
pub struct ReadinessPoller<'a, R> {
    runner: &'a R,
    interval: Duration,
    timeout: Option<Duration>,
}

impl<'a, R: CommandRunner> ReadinessPoller<'a, R> {
    pub fn new(runner: &'a R, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            timeout: None,
        }
    }

    /// Bound the overall wait. Without it the poll retries forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns once a probe exits cleanly.
    ///
    /// A probe exiting non-zero means the daemon is not listening yet and is
    /// retried after `interval`. A probe that cannot be launched is returned
    /// immediately, since retrying cannot fix a missing executable.
    pub async fn wait_until_ready(&self, cli: &DockerCli) -> Result<()> {
        let started = Instant::now();

        match self.timeout {
            None => self.poll(cli).await,
            Some(limit) => tokio::time::timeout(limit, self.poll(cli))
                .await
                .map_err(|_| BootstrapError::ReadinessTimeout {
                    endpoint: cli.host().to_string(),
                    waited: started.elapsed(),
                })?,
        }
    }

    async fn poll(&self, cli: &DockerCli) -> Result<()> {
        let probe = cli.info_probe();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.runner.run(&probe).await? {
                Exit::Clean => {
                    info!("Docker daemon at {} is ready ({} probes)", cli.host(), attempts);
                    return Ok(());
                }
                Exit::Failed { code } => {
                    debug!(
                        "Docker daemon at {} not ready (probe {}, exit {:?})",
                        cli.host(),
                        attempts,
                        code
                    );
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
