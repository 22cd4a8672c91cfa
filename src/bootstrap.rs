use crate::certs;
use crate::cmdline::BootParams;
use crate::config::BootstrapConfig;
use crate::daemon::{PluginInstallRequest, TransientDaemon};
use crate::error::Result;
use crate::handoff;
use crate::process::CommandRunner;
use crate::reboot::RebootWatch;
use std::future::Future;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapOptions {
    /// Stop after plugin installation instead of starting the engine.
    pub skip_handoff: bool,
}

/// The bootstrap sequence: registry CA, plugins through a transient daemon,
/// then the permanent engine. The first error stops everything.
pub async fn run<R: CommandRunner>(
    runner: &R,
    config: &BootstrapConfig,
    params: &BootParams,
    options: BootstrapOptions,
) -> Result<()> {
    certs::install_registry_ca(&config.certs_dir, &params.registry, &params.base_url).await?;

    info!("Installing the Docker Engine plugins");
    let requests: Vec<PluginInstallRequest> = config
        .plugins
        .iter()
        .map(|spec| spec.resolve(&params.registry))
        .collect();
    TransientDaemon::new(runner, config.transient_settings())
        .run(&params.credential(), &requests)
        .await?;

    if options.skip_handoff {
        info!("Skipping Docker Engine handoff");
        return Ok(());
    }

    handoff::start_engine(runner, &config.docker_init_bin, &config.dockerd_bin).await
}

/// Runs `bootstrap` with the reboot watcher as a second error channel.
///
/// A failing watcher ends the program: `bootstrap` is dropped where it
/// stands, which signals a running transient daemon and removes its config.
/// A watcher that is still polling, or that already rebooted, never
/// interrupts the bootstrap.
pub async fn run_watched<F>(watch: RebootWatch, bootstrap: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = bootstrap => result,
        err = watch.failure() => {
            error!("Reboot watcher failed, abandoning the bootstrap");
            Err(err)
        }
    }
}
