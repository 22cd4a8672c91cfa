use crate::daemon::{PluginSpec, TransientSettings};
use crate::error::{BootstrapError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bootstrap settings. Every field has a default, so a partial (or absent)
/// config file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub docker_bin: PathBuf,
    pub dockerd_bin: PathBuf,
    pub docker_init_bin: PathBuf,
    pub reboot_bin: PathBuf,

    /// Socket of the transient daemon (`unix://` endpoint).
    pub transient_socket: PathBuf,
    /// Config file written for the transient daemon.
    pub transient_config: PathBuf,

    pub reboot_marker: PathBuf,
    pub cmdline_path: PathBuf,
    pub certs_dir: PathBuf,

    pub probe_interval_secs: u64,
    /// Unset means the readiness poll never gives up.
    pub readiness_timeout_secs: Option<u64>,
    pub plugin_settle_secs: u64,
    pub teardown_settle_secs: u64,
    pub shutdown_grace_secs: u64,
    pub reboot_poll_secs: u64,

    pub plugins: Vec<PluginSpec>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            docker_bin: PathBuf::from("/usr/local/bin/docker"),
            dockerd_bin: PathBuf::from("/usr/local/bin/dockerd"),
            docker_init_bin: PathBuf::from("/usr/local/bin/docker-init"),
            reboot_bin: PathBuf::from("/sbin/reboot"),
            transient_socket: PathBuf::from("/dockerd.install.sock"),
            transient_config: PathBuf::from("/dockerd.install.json"),
            reboot_marker: PathBuf::from("/worker/reboot"),
            cmdline_path: PathBuf::from("/proc/cmdline"),
            certs_dir: PathBuf::from("/etc/docker/certs.d"),
            probe_interval_secs: 1,
            readiness_timeout_secs: None,
            plugin_settle_secs: 15,
            teardown_settle_secs: 15,
            shutdown_grace_secs: 10,
            reboot_poll_secs: 1,
            plugins: vec![PluginSpec::loki()],
        }
    }
}

impl BootstrapConfig {
    /// Loads `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::trace!(path = %path.display(), "Loading bootstrap config");

        if !path.exists() {
            tracing::trace!("Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| BootstrapError::path(path, e))?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            BootstrapError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            plugins = config.plugins.len(),
            plugin_settle_secs = config.plugin_settle_secs,
            teardown_settle_secs = config.teardown_settle_secs,
            "Bootstrap config loaded"
        );
        Ok(config)
    }

    /// Applies environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = crate::clienv::cmdline_path() {
            self.cmdline_path = path;
        }
        if let Some(path) = crate::clienv::reboot_marker() {
            self.reboot_marker = path;
        }
        self
    }

    pub fn transient_settings(&self) -> TransientSettings {
        TransientSettings {
            dockerd: self.dockerd_bin.clone(),
            docker: self.docker_bin.clone(),
            socket: self.transient_socket.clone(),
            config_path: self.transient_config.clone(),
            probe_interval: Duration::from_secs(self.probe_interval_secs),
            readiness_timeout: self.readiness_timeout_secs.map(Duration::from_secs),
            plugin_settle: Duration::from_secs(self.plugin_settle_secs),
            teardown_settle: Duration::from_secs(self.teardown_settle_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }

    pub fn reboot_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reboot_poll_secs)
    }
}
