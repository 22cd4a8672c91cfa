use crate::error::Result;
use crate::process::{CommandRunner, Invocation};
use std::path::Path;
use tracing::info;

/// `docker-init -s dockerd`: the permanent daemon, supervised by docker-init.
pub fn engine_invocation(docker_init: &Path, dockerd: &Path) -> Invocation {
    Invocation::new(docker_init).args(["-s".to_string(), dockerd.display().to_string()])
}

/// Runs the permanent docker engine in the foreground until it exits.
pub async fn start_engine<R: CommandRunner>(
    runner: &R,
    docker_init: &Path,
    dockerd: &Path,
) -> Result<()> {
    info!("Starting the Docker Engine");
    let invocation = engine_invocation(docker_init, dockerd);
    runner
        .run(&invocation)
        .await?
        .into_result(&invocation.display_name())
}
