//! Reboot watcher: reboots the host once a marker file shows up.
//!
//! Runs as its own tokio task for the whole life of the process, with no
//! coordination with the bootstrap sequence. Firing the reboot is expected to
//! end the program, whatever the bootstrap is doing at the time.

use crate::error::{BootstrapError, Result};
use crate::process::{CommandRunner, Invocation};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default poll interval for the marker
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// True when `path` exists and is not a directory.
pub fn marker_present(path: &Path) -> Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(!meta.is_dir()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BootstrapError::path(path, e)),
    }
}

pub struct RebootWatcher<R> {
    runner: Arc<R>,
    marker: PathBuf,
    reboot: Invocation,
    interval: Duration,
}

impl<R: CommandRunner + 'static> RebootWatcher<R> {
    pub fn new(runner: Arc<R>, marker: impl Into<PathBuf>, reboot_bin: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            marker: marker.into(),
            reboot: Invocation::new(reboot_bin),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Starts the watch loop on its own task.
    pub fn spawn(self) -> RebootWatch {
        RebootWatch {
            handle: tokio::spawn(async move { self.run().await }),
        }
    }

    /// Polls until the marker appears, reboots once and returns.
    ///
    /// A failing reboot command is returned as an error.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting Reboot Watcher (marker: {}, interval: {:?})",
            self.marker.display(),
            self.interval
        );

        loop {
            if marker_present(&self.marker)? {
                info!("Reboot marker {} found", self.marker.display());
                self.runner
                    .run(&self.reboot)
                    .await?
                    .into_result(&self.reboot.display_name())?;
                info!("Rebooting");
                return Ok(());
            }
            debug!("No reboot marker at {}", self.marker.display());
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Handle to a spawned [`RebootWatcher`]. Dropping it does not stop the task.
pub struct RebootWatch {
    handle: JoinHandle<Result<()>>,
}

impl RebootWatch {
    /// Stops the watcher. Not done on the normal path.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Resolves only if the watcher fails.
    ///
    /// A watcher that rebooted or was cancelled never resolves, so this can
    /// sit in a `select!` next to the bootstrap sequence as its error channel.
    pub async fn failure(self) -> BootstrapError {
        match self.handle.await {
            Ok(Err(e)) => e,
            Ok(Ok(())) => std::future::pending().await,
            Err(join_err) if join_err.is_panic() => {
                std::panic::resume_unwind(join_err.into_panic())
            }
            Err(_) => std::future::pending().await,
        }
    }
}
