use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The executable could not be started at all (missing binary, permissions).
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The executable ran and reported failure.
    #[error("{program} exited unsuccessfully ({})", describe_code(.code))]
    Exited { program: String, code: Option<i32> },

    #[error("daemon at {endpoint} not ready after {waited:?}")]
    ReadinessTimeout { endpoint: String, waited: Duration },

    #[error("i/o error on {}: {source}", .path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("temporary docker daemon already ran (stage {stage})")]
    AlreadyRan { stage: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BootstrapError {
    pub fn path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Path {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure came from a process that never started.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::Launch { .. })
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
