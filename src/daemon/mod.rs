//! Transient docker daemon used for plugin installation.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              TransientDaemon                 │
//! ├──────────────────────────────────────────────┤
//! │ dockerd (spawned) │ readiness │ login │ plugin│
//! ├──────────────────────────────────────────────┤
//! │        DockerCli → CommandRunner             │
//! └──────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod plugins;
pub mod readiness;
pub mod registry;
pub mod transient;

pub use client::DockerCli;
pub use plugins::{PluginInstallRequest, PluginSpec};
pub use readiness::ReadinessPoller;
pub use registry::RegistryCredential;
pub use transient::{Stage, TransientDaemon, TransientDaemonHandle, TransientSettings};
