//! Disposable docker daemon used to install plugins before the real one starts.
//!
//! Plugins can only be installed through a running dockerd, so a throwaway
//! instance is started on a private unix socket, logged into the registry,
//! used for `docker plugin install`, and shut down again. The sequence is
//! strictly ordered:
//!
//! ```text
//! Init → ConfigWritten → DaemonStarted → DaemonReady → Authenticated
//!      → PluginsInstalled → Settling → ShutdownRequested → Terminated → CleanedUp
//! ```
//!
//! Any failing step moves to `Failed` and stops the sequence. If the daemon
//! was already running it is torn down (best effort) before the error is
//! returned. Dropping an unfinished run signals the daemon and removes its
//! config file.

use super::client::DockerCli;
use super::plugins::{self, PluginInstallRequest};
use super::readiness::ReadinessPoller;
use super::registry::{self, RegistryCredential};
use crate::error::{BootstrapError, Result};
use crate::process::{CommandRunner, DaemonProcess, Exit, Invocation};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ConfigWritten,
    DaemonStarted,
    DaemonReady,
    Authenticated,
    PluginsInstalled,
    Settling,
    ShutdownRequested,
    Terminated,
    CleanedUp,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::ConfigWritten => "config-written",
            Stage::DaemonStarted => "daemon-started",
            Stage::DaemonReady => "daemon-ready",
            Stage::Authenticated => "authenticated",
            Stage::PluginsInstalled => "plugins-installed",
            Stage::Settling => "settling",
            Stage::ShutdownRequested => "shutdown-requested",
            Stage::Terminated => "terminated",
            Stage::CleanedUp => "cleaned-up",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths, binaries and delays for one transient daemon run.
#[derive(Debug, Clone)]
pub struct TransientSettings {
    pub dockerd: PathBuf,
    pub docker: PathBuf,
    /// Unix socket the daemon listens on. Never a TCP address.
    pub socket: PathBuf,
    pub config_path: PathBuf,
    pub probe_interval: Duration,
    pub readiness_timeout: Option<Duration>,
    /// Wait after plugin install so plugins finish starting.
    pub plugin_settle: Duration,
    /// Wait after shutdown for containerd and plugin runtimes to exit.
    pub teardown_settle: Duration,
    /// How long a failure-path teardown waits before killing dockerd.
    pub shutdown_grace: Duration,
}

impl TransientSettings {
    pub fn endpoint(&self) -> String {
        format!("unix://{}", self.socket.display())
    }
}

/// The single running transient daemon. Owned by [`TransientDaemon`] only.
///
/// Dropping the handle while dockerd is still running (for example when the
/// whole bootstrap is cancelled) sends it SIGTERM.
#[derive(Debug)]
pub struct TransientDaemonHandle<P: DaemonProcess> {
    endpoint: String,
    process: P,
    running: bool,
}

impl<P: DaemonProcess> TransientDaemonHandle<P> {
    fn new(endpoint: String, process: P) -> Self {
        Self {
            endpoint,
            process,
            running: true,
        }
    }

    fn terminate(&mut self) -> Result<()> {
        self.process.terminate()
    }

    async fn wait(&mut self) -> Result<Exit> {
        let exit = self.process.wait().await;
        self.running = false;
        exit
    }

    /// Failure-path teardown: SIGTERM, bounded wait, then kill. Errors are
    /// logged, never returned, so the original failure is what surfaces.
    async fn abandon(&mut self, grace: Duration) {
        if !self.running {
            return;
        }
        warn!(
            "Tearing down the temporary docker daemon on {} (PID {:?}) after failure",
            self.endpoint,
            self.process.id()
        );

        if let Err(e) = self.process.terminate() {
            warn!("Failed to signal the temporary docker daemon: {}", e);
        }

        match tokio::time::timeout(grace, self.process.wait()).await {
            Ok(Ok(exit)) => debug!("Temporary docker daemon exited: {:?}", exit),
            Ok(Err(e)) => warn!("Failed to wait for the temporary docker daemon: {}", e),
            Err(_) => {
                warn!("Temporary docker daemon did not stop in time, force killing");
                if let Err(e) = self.process.kill().await {
                    warn!("Failed to kill the temporary docker daemon: {}", e);
                }
            }
        }
        self.running = false;
    }
}

impl<P: DaemonProcess> Drop for TransientDaemonHandle<P> {
    fn drop(&mut self) {
        if !self.running {
            return;
        }
        warn!(
            "Temporary docker daemon on {} dropped while running, sending SIGTERM",
            self.endpoint
        );
        if let Err(e) = self.process.terminate() {
            warn!("Failed to signal the temporary docker daemon: {}", e);
        }
    }
}

/// The daemon config file on disk. Removed when dropped unless
/// [`ConfigArtifact::remove`] already did so.
#[derive(Debug)]
struct ConfigArtifact {
    path: PathBuf,
    present: bool,
}

impl ConfigArtifact {
    async fn write(path: &Path) -> Result<Self> {
        // Armed before the write so a cancelled write is cleaned up too.
        let artifact = Self {
            path: path.to_path_buf(),
            present: true,
        };
        write_daemon_config(path).await?;
        Ok(artifact)
    }

    async fn remove(mut self) -> Result<()> {
        self.present = false;
        remove_daemon_config(&self.path).await
    }
}

impl Drop for ConfigArtifact {
    fn drop(&mut self) {
        if !self.present {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// The daemon configuration written for the transient instance.
///
/// dockerd refuses to start without a config file even when nothing is
/// overridden, so an empty object is enough.
pub fn empty_daemon_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

pub async fn write_daemon_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BootstrapError::path(parent, e))?;
    }
    let content = serde_json::to_vec(&empty_daemon_config())?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| BootstrapError::path(path, e))
}

async fn remove_daemon_config(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BootstrapError::path(path, e)),
    }
}

/// Drives one transient daemon through its lifecycle.
pub struct TransientDaemon<'a, R: CommandRunner> {
    runner: &'a R,
    settings: TransientSettings,
    stage: Stage,
    attempting: Stage,
    history: Vec<Stage>,
    failed_during: Option<Stage>,
}

impl<'a, R: CommandRunner> TransientDaemon<'a, R> {
    pub fn new(runner: &'a R, settings: TransientSettings) -> Self {
        Self {
            runner,
            settings,
            stage: Stage::Init,
            attempting: Stage::Init,
            history: Vec::new(),
            failed_during: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stages reached so far, in order.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// The step that was running when the sequence failed.
    pub fn failed_during(&self) -> Option<Stage> {
        self.failed_during
    }

    /// Runs the full sequence. Can only be run once per instance.
    ///
    /// If the returned future is dropped part way, the daemon is sent
    /// SIGTERM and the config file is removed.
    pub async fn run(
        &mut self,
        credential: &RegistryCredential,
        requests: &[PluginInstallRequest],
    ) -> Result<()> {
        if self.stage != Stage::Init {
            return Err(BootstrapError::AlreadyRan {
                stage: self.stage.to_string(),
            });
        }

        let result = self.sequence(credential, requests).await;

        if let Err(ref err) = result {
            error!(
                "Temporary docker daemon failed during {}: {}",
                self.attempting, err
            );
            self.failed_during = Some(self.attempting);
            self.stage = Stage::Failed;
            self.history.push(Stage::Failed);
        }

        result
    }

    fn attempt(&mut self, next: Stage) {
        self.attempting = next;
    }

    fn reach(&mut self) {
        self.stage = self.attempting;
        self.history.push(self.attempting);
        debug!("Temporary docker daemon reached stage {}", self.stage);
    }

    async fn sequence(
        &mut self,
        credential: &RegistryCredential,
        requests: &[PluginInstallRequest],
    ) -> Result<()> {
        let endpoint = self.settings.endpoint();
        let config_path = self.settings.config_path.clone();

        self.attempt(Stage::ConfigWritten);
        let config = ConfigArtifact::write(&config_path).await?;
        self.reach();

        self.attempt(Stage::DaemonStarted);
        info!("Starting up the temporary docker daemon on {}", endpoint);
        let dockerd = Invocation::new(&self.settings.dockerd).args([
            "--config-file".to_string(),
            config_path.display().to_string(),
            "--host".to_string(),
            endpoint.clone(),
        ]);
        let process = self.runner.spawn(&dockerd)?;
        // Declared after `config`, so on drop the daemon is signalled before
        // its config file goes away.
        let mut handle = TransientDaemonHandle::new(endpoint, process);
        self.reach();

        if let Err(err) = self.operate(&mut handle, credential, requests).await {
            handle.abandon(self.settings.shutdown_grace).await;
            if let Err(e) = config.remove().await {
                warn!("{}", e);
            }
            return Err(err);
        }

        self.attempt(Stage::CleanedUp);
        config.remove().await?;
        info!("Waiting for the containerd and docker plugins to shutdown");
        tokio::time::sleep(self.settings.teardown_settle).await;
        self.reach();

        Ok(())
    }

    /// Readiness through termination, against the running daemon.
    async fn operate(
        &mut self,
        handle: &mut TransientDaemonHandle<R::Process>,
        credential: &RegistryCredential,
        requests: &[PluginInstallRequest],
    ) -> Result<()> {
        let cli = DockerCli::new(&self.settings.docker, self.settings.endpoint());

        self.attempt(Stage::DaemonReady);
        ReadinessPoller::new(self.runner, self.settings.probe_interval)
            .with_timeout(self.settings.readiness_timeout)
            .wait_until_ready(&cli)
            .await?;
        self.reach();

        self.attempt(Stage::Authenticated);
        registry::login(self.runner, &cli, credential).await?;
        self.reach();

        self.attempt(Stage::PluginsInstalled);
        for request in requests {
            plugins::install(self.runner, &cli, request).await?;
        }
        self.reach();

        self.attempt(Stage::Settling);
        info!("Waiting for the plugins to be ready");
        tokio::time::sleep(self.settings.plugin_settle).await;
        self.reach();

        self.attempt(Stage::ShutdownRequested);
        info!("Shutting down the temporary docker daemon");
        handle.terminate()?;
        self.reach();

        self.attempt(Stage::Terminated);
        let program = self.settings.dockerd.display().to_string();
        handle.wait().await?.into_result(&program)?;
        self.reach();

        Ok(())
    }
}
