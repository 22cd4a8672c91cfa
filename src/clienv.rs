use std::path::PathBuf;

/// Environment variables read by the bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVar {
    BootstrapConfig,
    Cmdline,
    RebootMarker,
}

impl EnvVar {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvVar::BootstrapConfig => "DOCKER_BOOTSTRAP_CONFIG",
            EnvVar::Cmdline => "DOCKER_BOOTSTRAP_CMDLINE",
            EnvVar::RebootMarker => "DOCKER_BOOTSTRAP_REBOOT_MARKER",
        }
    }
}

/// Value of `name`, treating unset and empty alike.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

const DEFAULT_CONFIG_PATH: &str = "/etc/docker-bootstrap/config.toml";

/// Bootstrap config file ($DOCKER_BOOTSTRAP_CONFIG or /etc/docker-bootstrap/config.toml)
pub fn config_path() -> PathBuf {
    let path = PathBuf::from(env_or(EnvVar::BootstrapConfig.as_str(), DEFAULT_CONFIG_PATH));
    tracing::trace!(path = %path.display(), "Resolved bootstrap config path");
    path
}

/// Kernel command line override ($DOCKER_BOOTSTRAP_CMDLINE)
pub fn cmdline_path() -> Option<PathBuf> {
    let val = env_opt(EnvVar::Cmdline.as_str()).map(PathBuf::from);
    tracing::trace!(value = ?val, "DOCKER_BOOTSTRAP_CMDLINE env var");
    val
}

/// Reboot marker override ($DOCKER_BOOTSTRAP_REBOOT_MARKER)
pub fn reboot_marker() -> Option<PathBuf> {
    let val = env_opt(EnvVar::RebootMarker.as_str()).map(PathBuf::from);
    tracing::trace!(value = ?val, "DOCKER_BOOTSTRAP_REBOOT_MARKER env var");
    val
}
