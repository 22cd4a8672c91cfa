pub mod bootstrap;
pub mod certs;
pub mod clienv;
pub mod cmdline;
pub mod config;
pub mod daemon;
pub mod error;
pub mod handoff;
pub mod process;
pub mod reboot;

#[cfg(test)]
pub(crate) mod testing;

pub use config::BootstrapConfig;
pub use error::{BootstrapError, Result};
pub use process::{CommandRunner, SystemRunner};
