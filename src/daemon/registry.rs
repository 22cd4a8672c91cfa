use super::client::DockerCli;
use crate::error::Result;
use crate::process::CommandRunner;
use std::fmt;
use tracing::info;

/// Private registry login. Held in memory only for the login call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryCredential {
    pub registry_address: String,
    pub username: String,
    pub password: String,
}

impl RegistryCredential {
    pub fn new(
        registry_address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            registry_address: registry_address.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("registry_address", &self.registry_address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Logs the daemon behind `cli` into the credential's registry.
///
/// The password travels over the child's stdin so it never shows up in
/// process listings. Failures are not retried.
pub async fn login<R: CommandRunner>(
    runner: &R,
    cli: &DockerCli,
    credential: &RegistryCredential,
) -> Result<()> {
    info!("Logging in the {} registry", credential.registry_address);

    let invocation = cli.login(
        &credential.registry_address,
        &credential.username,
        &credential.password,
    );
    runner
        .run(&invocation)
        .await?
        .into_result(&invocation.display_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;
    use crate::testing::{Scripted, ScriptedRunner};

    fn cli() -> DockerCli {
        DockerCli::new("/usr/local/bin/docker", "unix:///test.sock")
    }

    #[tokio::test]
    async fn test_password_only_on_stdin() {
        let runner = ScriptedRunner::new();
        let passwords = ["hunter2", "--password", "p@ss word", "registry.local", ""];

        for password in passwords {
            let cred = RegistryCredential::new("registry.local", "robot", password);
            login(&runner, &cli(), &cred).await.unwrap();
        }

        let runs = runner.runs_of("login");
        assert_eq!(runs.len(), passwords.len());
        for (inv, password) in runs.iter().zip(passwords) {
            assert_eq!(inv.get_stdin(), Some(password.as_bytes()));
            // The registry address is a legitimate argument even when it
            // collides with the password text.
            let leaked = inv
                .get_args()
                .iter()
                .filter(|a| !password.is_empty() && a.as_str() == password)
                .filter(|a| a.as_str() != "registry.local")
                .count();
            assert_eq!(leaked, 0, "password leaked into argv: {:?}", inv.get_args());
            assert!(inv.get_args().iter().any(|a| a == "--password-stdin"));
        }
    }

    #[tokio::test]
    async fn test_username_and_registry_are_arguments() {
        let runner = ScriptedRunner::new();
        let cred = RegistryCredential::new("registry.local:5000", "robot", "pw");
        login(&runner, &cli(), &cred).await.unwrap();

        let args = runner.runs_of("login")[0].get_args().to_vec();
        assert_eq!(
            args,
            [
                "--host",
                "unix:///test.sock",
                "login",
                "--username",
                "robot",
                "--password-stdin",
                "registry.local:5000",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_login_is_reported() {
        let runner = ScriptedRunner::new().on("login", [Scripted::FAILED]);
        let cred = RegistryCredential::new("registry.local", "robot", "wrong");
        let err = login(&runner, &cli(), &cred).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Exited { code: Some(1), .. }));
        assert_eq!(runner.runs_of("login").len(), 1);
    }

    #[test]
    fn test_debug_hides_password() {
        let cred = RegistryCredential::new("r", "u", "topsecret");
        assert!(!format!("{:?}", cred).contains("topsecret"));
    }
}
