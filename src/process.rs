//! Process runner used by every bootstrap step.
//!
//! Child output is never captured: stdout and stderr are inherited so the
//! docker tooling writes straight to the console of the provisioning
//! environment. Two failure classes are kept apart:
//!
//! - the executable could not be started ([`BootstrapError::Launch`])
//! - it started and exited unsuccessfully ([`Exit::Failed`])

use crate::error::{BootstrapError, Result};
use std::fmt;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, trace};

/// How a started process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Clean,
    /// Non-zero exit. `code` is `None` when the process died from a signal.
    Failed { code: Option<i32> },
}

impl Exit {
    pub fn success(&self) -> bool {
        matches!(self, Exit::Clean)
    }

    /// Converts a failed exit into [`BootstrapError::Exited`] for `program`.
    pub fn into_result(self, program: &str) -> Result<()> {
        match self {
            Exit::Clean => Ok(()),
            Exit::Failed { code } => Err(BootstrapError::Exited {
                program: program.to_string(),
                code,
            }),
        }
    }
}

impl From<std::process::ExitStatus> for Exit {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            Exit::Clean
        } else {
            Exit::Failed {
                code: status.code(),
            }
        }
    }
}

/// An executable, its arguments and an optional payload for its stdin.
#[derive(Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    stdin: Option<Vec<u8>>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bytes written to the child's stdin before it is closed.
    pub fn stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    /// Program path for log lines and error messages.
    pub fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

// stdin can carry secrets (registry password), so only its length is shown.
impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field(
                "stdin",
                &self.stdin.as_ref().map(|s| format!("<{} bytes>", s.len())),
            )
            .finish()
    }
}

/// Starts external processes.
pub trait CommandRunner: Send + Sync {
    type Process: DaemonProcess;

    /// Runs `invocation` to completion.
    ///
    /// Returns `Err` only when the process could not be launched; a process
    /// that ran and failed is reported as [`Exit::Failed`].
    fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<Exit>> + Send;

    /// Starts `invocation` in the background and returns its handle.
    fn spawn(&self, invocation: &Invocation) -> Result<Self::Process>;
}

/// Handle to a background process started by [`CommandRunner::spawn`].
pub trait DaemonProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Requests graceful termination (SIGTERM on unix).
    fn terminate(&mut self) -> Result<()>;

    /// Forcefully stops the process and reaps it.
    fn kill(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Blocks until the process exits.
    fn wait(&mut self) -> impl Future<Output = Result<Exit>> + Send;
}

/// [`CommandRunner`] backed by real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.get_args());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        if invocation.get_stdin().is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        // A dropped run (e.g. a timed-out readiness probe) must not leave the child behind.
        cmd.kill_on_drop(true);
        cmd
    }

    fn launch(invocation: &Invocation, mut cmd: Command) -> Result<Child> {
        cmd.spawn().map_err(|source| BootstrapError::Launch {
            program: invocation.display_name(),
            source,
        })
    }
}

impl CommandRunner for SystemRunner {
    type Process = SpawnedProcess;

    async fn run(&self, invocation: &Invocation) -> Result<Exit> {
        debug!("Running {:?}", invocation);

        let mut child = Self::launch(invocation, Self::command(invocation))?;

        if let Some(payload) = invocation.get_stdin() {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(payload).await {
                    Ok(()) => {}
                    // The child may exit without reading its input.
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                        trace!("{} closed stdin early", invocation.display_name());
                    }
                    Err(e) => return Err(e.into()),
                }
                // Dropping the pipe delivers EOF.
                drop(stdin);
            }
        }

        let exit = Exit::from(child.wait().await?);
        debug!("{} finished: {:?}", invocation.display_name(), exit);
        Ok(exit)
    }

    fn spawn(&self, invocation: &Invocation) -> Result<SpawnedProcess> {
        debug!("Spawning {:?}", invocation);

        let child = Self::launch(invocation, Self::command(invocation))?;

        debug!("{} started with PID {:?}", invocation.display_name(), child.id());
        Ok(SpawnedProcess {
            program: invocation.display_name(),
            child,
        })
    }
}

/// A background OS process. Killed if dropped while still running.
#[derive(Debug)]
pub struct SpawnedProcess {
    program: String,
    child: Child,
}

impl DaemonProcess for SpawnedProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn terminate(&mut self) -> Result<()> {
        // No PID means the child has already been reaped.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        debug!("Sending SIGTERM to {} (PID {})", self.program, pid);

        #[cfg(unix)]
        {
            let rc = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }

        #[cfg(not(unix))]
        {
            self.child.start_kill()?;
        }

        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }

    async fn wait(&mut self) -> Result<Exit> {
        let status = self.child.wait().await?;
        Ok(Exit::from(status))
    }
}
