use crate::process::Invocation;
use std::path::PathBuf;

/// Builds `docker` CLI invocations aimed at one daemon endpoint.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    host: String,
}

impl DockerCli {
    /// `host` is passed verbatim to `--host` (e.g. `unix:///dockerd.install.sock`).
    pub fn new(binary: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            host: host.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn base(&self) -> Invocation {
        Invocation::new(&self.binary).args(["--host", self.host.as_str()])
    }

    /// Cheap status query; exits 0 once the daemon answers API requests.
    pub fn info_probe(&self) -> Invocation {
        self.base().args(["info", "--format", "{{.ServerVersion}}"])
    }

    /// `docker login` with the password read from stdin.
    pub fn login(&self, registry: &str, username: &str, password: &str) -> Invocation {
        self.base()
            .args(["login", "--username", username, "--password-stdin", registry])
            .stdin(password.as_bytes().to_vec())
    }

    /// `docker plugin install` granting every permission the plugin asks for.
    pub fn plugin_install(&self, alias: &str, image: &str, extra: &[String]) -> Invocation {
        self.base()
            .args([
                "plugin",
                "install",
                "--grant-all-permissions",
                "--alias",
                alias,
                image,
            ])
            .args(extra.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_info_args() {
        let cli = DockerCli::new("/usr/local/bin/docker", "unix:///tmp/d.sock");
        let inv = cli.info_probe();
        assert_eq!(inv.program(), Path::new("/usr/local/bin/docker"));
        assert_eq!(
            inv.get_args(),
            ["--host", "unix:///tmp/d.sock", "info", "--format", "{{.ServerVersion}}"]
        );
        assert!(inv.get_stdin().is_none());
    }

    #[test]
    fn test_plugin_install_appends_extra_args_in_order() {
        let cli = DockerCli::new("docker", "unix:///x.sock");
        let extra = vec!["LOG_LEVEL=info".to_string(), "B=2".to_string()];
        let inv = cli.plugin_install("loki", "reg/loki:1", &extra);
        assert_eq!(
            inv.get_args(),
            [
                "--host",
                "unix:///x.sock",
                "plugin",
                "install",
                "--grant-all-permissions",
                "--alias",
                "loki",
                "reg/loki:1",
                "LOG_LEVEL=info",
                "B=2",
            ]
        );
    }
}
