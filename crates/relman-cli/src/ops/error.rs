//! Errors surfaced by a deploy run, one variant per phase.

use relman_core::builder::BuildError;
use relman_core::config::ConfigError;
use relman_core::divergence::DivergenceError;
use relman_core::io::download::DownloadError;
use relman_core::manifest::ManifestIoError;
use relman_core::publish::UploadError;
use relman_core::remote::RemoteError;
use relman_core::retention::RetentionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Manifest(#[from] ManifestIoError),

    #[error("Pruning failed: {0}")]
    Retention(#[from] RetentionError),

    #[error("Divergence check failed: {0}")]
    Divergence(#[from] DivergenceError),

    #[error("Sync failed: {0}")]
    Sync(#[from] DownloadError),

    #[error("Publish failed: {0}")]
    Publish(#[from] UploadError),

    #[error("Remote host error: {0}")]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No access token: set RELMAN_GITHUB_TOKEN or GITHUB_TOKEN")]
    NoCredentials,

    #[error("Interrupted before {phase}")]
    Cancelled { phase: &'static str },
}
