//! Local-versus-remote divergence detection.
//!
//! Before a release cycle starts, the local release directory is compared
//! with the last published release. Any disagreement means the local cache
//! cannot be trusted and is rebuilt from the remote assets by
//! [`crate::sync`].

use std::fmt;

use thiserror::Error;

use crate::config::DeployConfig;
use crate::manifest::{self, ManifestIoError};
use crate::remote::{ReleaseDescriptor, RemoteAsset, RemoteError, RemoteHost};

#[derive(Error, Debug)]
pub enum DivergenceError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Manifest(#[from] ManifestIoError),
}

/// Why a refresh is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshReason {
    /// The full package for the remote release's version is not on disk.
    MissingBaseline { filename: String },
    /// There is no local manifest to compare against.
    LocalManifestMissing,
    /// Local and remote manifests differ byte-for-byte.
    ManifestDiffers,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBaseline { filename } => write!(f, "{filename} is missing locally"),
            Self::LocalManifestMissing => f.write_str("no local manifest"),
            Self::ManifestDiffers => f.write_str("local manifest differs from remote"),
        }
    }
}

/// Outcome of a divergence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing has been published yet.
    FirstRelease,
    /// The last release carries no manifest asset; nothing to compare.
    NoRemoteManifest,
    /// The local directory must be rebuilt from the remote release.
    RefreshRequired(RefreshReason),
    /// Local cache matches the remote release.
    InSync,
}

impl Verdict {
    pub fn needs_refresh(&self) -> bool {
        matches!(self, Self::RefreshRequired(_))
    }
}

/// Verdict plus the remote state it was computed from.
#[derive(Debug, Clone)]
pub struct Divergence {
    pub verdict: Verdict,
    pub release: Option<ReleaseDescriptor>,
    pub assets: Vec<RemoteAsset>,
}

/// Compare a local manifest against the remote one.
///
/// `baseline_present` says whether the full package for the remote
/// release's version exists locally.
pub fn judge(
    baseline: &str,
    baseline_present: bool,
    local_manifest: Option<&[u8]>,
    remote_manifest: &[u8],
) -> Verdict {
    if !baseline_present {
        return Verdict::RefreshRequired(RefreshReason::MissingBaseline {
            filename: baseline.to_string(),
        });
    }
    match local_manifest {
        None => Verdict::RefreshRequired(RefreshReason::LocalManifestMissing),
        Some(local) if local != remote_manifest => {
            Verdict::RefreshRequired(RefreshReason::ManifestDiffers)
        }
        Some(_) => Verdict::InSync,
    }
}

/// Decide whether the local release directory can be trusted.
///
/// `release` is the last published release, if any. The remote manifest is
/// only fetched once the local baseline is known to be present.
///
/// # Errors
///
/// Returns an error if the remote host cannot be queried or the local
/// manifest cannot be read.
pub async fn detect(
    config: &DeployConfig,
    host: &dyn RemoteHost,
    release: Option<ReleaseDescriptor>,
) -> Result<Divergence, DivergenceError> {
    let Some(release) = release else {
        return Ok(Divergence {
            verdict: Verdict::FirstRelease,
            release: None,
            assets: Vec::new(),
        });
    };

    let assets = host.list_assets(release.id).await?;
    let Some(remote_manifest) = assets.iter().find(|a| a.name == config.manifest_name) else {
        tracing::warn!(
            "release {} has no {} asset",
            release.tag_name,
            config.manifest_name
        );
        return Ok(Divergence {
            verdict: Verdict::NoRemoteManifest,
            release: Some(release),
            assets,
        });
    };

    let baseline = config.full_package_name(&release.tag_name);
    let baseline_present = tokio::fs::try_exists(config.release_dir.join(&baseline))
        .await
        .unwrap_or(false);

    let verdict = if baseline_present {
        let local = manifest::read_bytes(&config.manifest_path()).await?;
        let remote = host.fetch_asset_bytes(remote_manifest.id).await?;
        judge(&baseline, true, local.as_deref(), &remote)
    } else {
        judge(&baseline, false, None, &[])
    };
    tracing::debug!("divergence verdict for {}: {verdict:?}", release.tag_name);

    Ok(Divergence {
        verdict,
        release: Some(release),
        assets,
    })
}
