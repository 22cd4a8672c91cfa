mod args;

use args::Cli;
use clap::Parser;
use docker_bootstrap::bootstrap::{self, BootstrapOptions};
use docker_bootstrap::cmdline::BootParams;
use docker_bootstrap::reboot::RebootWatcher;
use docker_bootstrap::{clienv, BootstrapConfig, SystemRunner};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Starting docker-bootstrap v{}", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.unwrap_or_else(clienv::config_path);
    let mut config = BootstrapConfig::load(&config_path)?.with_env_overrides();
    if let Some(cmdline) = cli.cmdline {
        config.cmdline_path = cmdline;
    }

    let runner = Arc::new(SystemRunner::new());

    // Never joined: the watcher outlives the bootstrap and ends the program
    // by rebooting the host.
    let watch = RebootWatcher::new(
        Arc::clone(&runner),
        &config.reboot_marker,
        &config.reboot_bin,
    )
    .with_interval(config.reboot_poll_interval())
    .spawn();

    let params = BootParams::load(&config.cmdline_path).await?;
    let options = BootstrapOptions {
        skip_handoff: cli.skip_handoff,
    };

    bootstrap::run_watched(
        watch,
        bootstrap::run(runner.as_ref(), &config, &params, options),
    )
    .await?;

    Ok(())
}
