//! Shared command context.
//!
//! Groups the configuration, the resolved remote capability, the reporter
//! and the cancellation token so commands and the orchestrator take one
//! argument instead of four.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use relman_core::remote::{self, RemoteHost};
use relman_core::{Credentials, DeployConfig, Reporter};
use tokio_util::sync::CancellationToken;

use super::DeployError;

/// Environment variables checked for the access token, in order.
pub const TOKEN_VARS: [&str; 2] = ["RELMAN_GITHUB_TOKEN", "GITHUB_TOKEN"];

#[derive(Clone)]
pub struct Context {
    pub config: DeployConfig,
    pub remote: Option<Arc<dyn RemoteHost>>,
    pub reporter: Arc<dyn Reporter>,
    pub cancel: CancellationToken,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("remote", &self.remote.is_some())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(
        config: DeployConfig,
        remote: Option<Arc<dyn RemoteHost>>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            remote,
            reporter,
            cancel: CancellationToken::new(),
        }
    }

    /// Load `config_path` and resolve the remote capability from `credentials`.
    pub fn load(
        config_path: &Path,
        credentials: &Credentials,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, DeployError> {
        let config = DeployConfig::load(config_path)?;
        let remote = remote::connect(&config, credentials)?;
        if remote.is_none() {
            tracing::debug!("no access token, remote operations disabled");
        }
        Ok(Self::new(config, remote, reporter))
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    pub fn remote(&self) -> Option<&dyn RemoteHost> {
        self.remote.as_deref()
    }

    pub fn require_remote(&self) -> Result<&dyn RemoteHost, DeployError> {
        self.remote().ok_or(DeployError::NoCredentials)
    }
}

/// First non-empty token among `candidates`.
pub fn pick_token<I>(candidates: I) -> Credentials
where
    I: IntoIterator<Item = Option<String>>,
{
    let token = candidates
        .into_iter()
        .flatten()
        .find(|t| !t.trim().is_empty());
    Credentials::new(token)
}

/// Read the access token from [`TOKEN_VARS`].
pub fn credentials_from_env() -> Credentials {
    pick_token(TOKEN_VARS.iter().map(|var| std::env::var(var).ok()))
}
