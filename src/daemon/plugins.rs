use super::client::DockerCli;
use crate::error::Result;
use crate::process::CommandRunner;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Placeholder in configured image references, replaced by the registry address.
pub const REGISTRY_PLACEHOLDER: &str = "{registry}";

/// One `docker plugin install` against a daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInstallRequest {
    /// Must be unique per daemon; duplicates are rejected by dockerd itself.
    pub alias: String,
    pub image: String,
    /// Plugin settings (`KEY=value`), appended after the image in order.
    pub extra_arguments: Vec<String>,
}

/// Plugin as written in the bootstrap config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub alias: String,
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PluginSpec {
    /// The Loki log driver every worker gets.
    pub fn loki() -> Self {
        Self {
            alias: "loki".to_string(),
            image: format!("{}/grafana/loki-docker-driver:2.3.0", REGISTRY_PLACEHOLDER),
            args: vec!["LOG_LEVEL=info".to_string()],
        }
    }

    pub fn resolve(&self, registry: &str) -> PluginInstallRequest {
        PluginInstallRequest {
            alias: self.alias.clone(),
            image: self.image.replace(REGISTRY_PLACEHOLDER, registry),
            extra_arguments: self.args.clone(),
        }
    }
}

/// Installs `request` into the daemon behind `cli`, granting all permissions.
pub async fn install<R: CommandRunner>(
    runner: &R,
    cli: &DockerCli,
    request: &PluginInstallRequest,
) -> Result<()> {
    info!("Installing the {} plugin ({})", request.alias, request.image);

    let invocation = cli.plugin_install(&request.alias, &request.image, &request.extra_arguments);
    runner
        .run(&invocation)
        .await?
        .into_result(&invocation.display_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Scripted, ScriptedRunner};

    #[test]
    fn test_loki_resolves_against_registry() {
        let request = PluginSpec::loki().resolve("registry.local:5000");
        assert_eq!(request.alias, "loki");
        assert_eq!(
            request.image,
            "registry.local:5000/grafana/loki-docker-driver:2.3.0"
        );
        assert_eq!(request.extra_arguments, ["LOG_LEVEL=info"]);
    }

    #[test]
    fn test_spec_without_args_parses() {
        let spec: PluginSpec = toml::from_str(
            r#"
            alias = "fluent"
            image = "docker.io/fluent/driver:1"
            "#,
        )
        .unwrap();
        assert!(spec.args.is_empty());
        assert_eq!(spec.resolve("ignored").image, "docker.io/fluent/driver:1");
    }

    #[tokio::test]
    async fn test_install_always_grants_permissions() {
        let runner = ScriptedRunner::new();
        let cli = DockerCli::new("docker", "unix:///test.sock");
        install(&runner, &cli, &PluginSpec::loki().resolve("reg"))
            .await
            .unwrap();

        let runs = runner.runs_of("plugin");
        assert_eq!(runs.len(), 1);
        let args = runs[0].get_args();
        assert!(args.iter().any(|a| a == "--grant-all-permissions"));
        assert_eq!(args.last().map(String::as_str), Some("LOG_LEVEL=info"));
    }

    #[tokio::test]
    async fn test_install_failure_propagates() {
        let runner = ScriptedRunner::new().on("plugin", [Scripted::FAILED]);
        let cli = DockerCli::new("docker", "unix:///test.sock");
        let result = install(&runner, &cli, &PluginSpec::loki().resolve("reg")).await;
        assert!(result.is_err());
    }
}
