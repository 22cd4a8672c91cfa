use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docker-bootstrap")]
#[command(version)]
#[command(
    about = "Install Docker Engine plugins through a temporary daemon, then start the engine",
    long_about = None
)]
pub(crate) struct Cli {
    /// Bootstrap config file. Can also be set via DOCKER_BOOTSTRAP_CONFIG env var.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Read boot parameters from this file instead of /proc/cmdline
    #[arg(long)]
    pub cmdline: Option<PathBuf>,

    /// Stop after installing plugins; do not start the Docker Engine
    #[arg(long)]
    pub skip_handoff: bool,
}
