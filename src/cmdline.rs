//! Boot parameters handed to the worker on the kernel command line.

use crate::daemon::RegistryCredential;
use crate::error::{BootstrapError, Result};
use std::path::Path;
use tracing::{debug, trace};

/// Values read from `/proc/cmdline`. Missing keys stay empty; nothing is
/// validated here, an empty value fails later in whichever step needs it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BootParams {
    pub registry: String,
    pub registry_username: String,
    pub registry_password: String,
    /// Base URL serving `ca.pem` for the registry.
    pub base_url: String,
    /// Control-plane address; carried through for later stages.
    pub tinkerbell: String,
}

impl BootParams {
    /// Parses a kernel command line. Tokens are whitespace separated, the key
    /// ends at the first `=`, and unknown keys are ignored.
    pub fn parse(cmdline: &str) -> Self {
        let mut params = Self::default();

        for token in cmdline.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };

            let field = match key {
                "docker_registry" => &mut params.registry,
                "registry_username" => &mut params.registry_username,
                "registry_password" => &mut params.registry_password,
                "packet_base_url" => &mut params.base_url,
                "tinkerbell" => &mut params.tinkerbell,
                _ => {
                    trace!(key = %key, "Ignoring kernel parameter");
                    continue;
                }
            };
            *field = value.to_string();
        }

        params
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BootstrapError::path(path, e))?;
        let params = Self::parse(&content);
        debug!(
            registry = %params.registry,
            base_url = %params.base_url,
            tinkerbell = %params.tinkerbell,
            "Parsed kernel command line"
        );
        Ok(params)
    }

    pub fn credential(&self) -> RegistryCredential {
        RegistryCredential::new(
            &self.registry,
            &self.registry_username,
            &self.registry_password,
        )
    }
}

impl std::fmt::Debug for BootParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootParams")
            .field("registry", &self.registry)
            .field("registry_username", &self.registry_username)
            .field("registry_password", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("tinkerbell", &self.tinkerbell)
            .finish()
    }
}
