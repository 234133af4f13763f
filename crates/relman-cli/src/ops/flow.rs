//! The deploy pipeline.
//!
//! Phases run strictly in order and the first error aborts the run:
//!
//! 1. make sure the release directory exists
//! 2. find the last published (non-draft) release
//! 3. compute the version
//! 4. recreate the staging directory
//! 5. divergence check, refreshing the release directory when required
//! 6. build
//! 7. prune
//! 8. missing-file check
//! 9. publish (when enabled and a token is present)
//!
//! The divergence check runs before the build because a refresh wipes the
//! release directory, and the packer needs the previous full package there.

use chrono::NaiveDate;
use relman_core::builder::{BuildRequest, Toolchain};
use relman_core::divergence::{self, Verdict};
use relman_core::io::fs::{ensure_dir, refresh_directory};
use relman_core::manifest;
use relman_core::publish::{PublishReport, Publisher};
use relman_core::remote::{self, ReleaseDescriptor};
use relman_core::retention::{self, MissingAsset, RetentionEngine, RetentionReport};
use relman_core::sync::{SyncClient, SyncReport};
use relman_core::version::next_version;

use super::{Context, DeployError};

/// Switches for a deploy run.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Explicit version; computed from the date when absent.
    pub version: Option<String>,
    pub build: bool,
    pub upload: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            version: None,
            build: true,
            upload: true,
        }
    }
}

/// Everything a deploy run did.
#[derive(Debug)]
pub struct DeployOutcome {
    pub version: String,
    /// `None` when running without a remote host.
    pub verdict: Option<Verdict>,
    pub synced: Option<SyncReport>,
    pub retention: RetentionReport,
    pub missing: Vec<MissingAsset>,
    pub published: Option<PublishReport>,
}

/// The last non-draft release, or `None` without a remote host.
pub async fn last_release(ctx: &Context) -> Result<Option<ReleaseDescriptor>, DeployError> {
    let Some(host) = ctx.remote() else {
        return Ok(None);
    };
    Ok(remote::latest_release(host, false).await?)
}

/// The version to deploy: `explicit`, or the next date-based version.
pub fn resolve_version(
    ctx: &Context,
    last: Option<&ReleaseDescriptor>,
    explicit: Option<String>,
    today: NaiveDate,
) -> String {
    explicit.unwrap_or_else(|| {
        next_version(
            last.map(|r| r.tag_name.as_str()),
            today,
            ctx.config.version.increment,
        )
    })
}

/// Create the release directory if it does not exist yet.
pub async fn ensure_release_dir(ctx: &Context) -> Result<(), DeployError> {
    let dir = &ctx.config.release_dir;
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        ctx.reporter().warning(&format!(
            "No release directory found, creating {}",
            dir.display()
        ));
        ensure_dir(dir).await?;
    }
    Ok(())
}

/// Run the divergence check against `last` and refresh when required.
pub async fn reconcile(
    ctx: &Context,
    last: Option<ReleaseDescriptor>,
) -> Result<(Verdict, Option<SyncReport>), DeployError> {
    let host = ctx.require_remote()?;
    let reporter = ctx.reporter();

    let found = divergence::detect(&ctx.config, host, last).await?;
    let synced = match &found.verdict {
        Verdict::FirstRelease => {
            reporter.warning("No releases found. This will be the first release.");
            None
        }
        Verdict::NoRemoteManifest => {
            reporter.warning(&format!(
                "Last release has no {} asset; using local state as-is",
                ctx.config.manifest_name
            ));
            None
        }
        Verdict::InSync => {
            reporter.info("Local releases match the last published release");
            None
        }
        Verdict::RefreshRequired(reason) => {
            reporter.section("Syncing");
            reporter.info(&format!("Refreshing release directory: {reason}"));
            let client = SyncClient::new(&ctx.config, host, reporter, &ctx.cancel);
            Some(client.refresh(&found.assets).await?)
        }
    };

    Ok((found.verdict, synced))
}

/// Prune the release directory.
pub async fn prune(ctx: &Context) -> Result<RetentionReport, DeployError> {
    ctx.reporter().section("Pruning");
    Ok(RetentionEngine::new(&ctx.config, ctx.reporter()).run().await?)
}

/// Manifest records with no file in the release directory.
pub async fn check(ctx: &Context) -> Result<Vec<MissingAsset>, DeployError> {
    let manifest = manifest::load_or_empty(&ctx.config.manifest_path()).await?;
    let missing =
        retention::check_release_files(&ctx.config.release_dir, &manifest, &ctx.config.markers);
    for asset in &missing {
        ctx.reporter()
            .warning(&format!("Local file missing: {}", asset.filename));
    }
    Ok(missing)
}

/// Stop between phases once the run has been interrupted.
fn checkpoint(ctx: &Context, phase: &'static str) -> Result<(), DeployError> {
    if ctx.cancel.is_cancelled() {
        tracing::warn!("interrupted, skipping {phase}");
        return Err(DeployError::Cancelled { phase });
    }
    Ok(())
}

/// Full deploy pipeline.
pub async fn deploy(
    ctx: &Context,
    toolchain: &dyn Toolchain,
    today: NaiveDate,
    options: DeployOptions,
) -> Result<DeployOutcome, DeployError> {
    let reporter = ctx.reporter();
    let config = &ctx.config;

    ensure_release_dir(ctx).await?;

    let last = last_release(ctx).await?;
    match &last {
        Some(release) => reporter.info(&format!("Last release: {}", release.display_name())),
        None if ctx.remote().is_some() => reporter.info("No published releases"),
        None => {}
    }

    let version = resolve_version(ctx, last.as_ref(), options.version, today);
    reporter.section(&format!("Deploying {version}"));
    tracing::info!(%version, "starting deploy");

    refresh_directory(&config.staging_dir).await?;

    checkpoint(ctx, "sync")?;
    let (verdict, synced) = if ctx.remote().is_some() {
        let (verdict, synced) = reconcile(ctx, last).await?;
        (Some(verdict), synced)
    } else {
        reporter.warning("No remote host available; skipping divergence check");
        (None, None)
    };

    checkpoint(ctx, "build")?;
    if options.build {
        reporter.section("Building");
        toolchain
            .produce(&BuildRequest::new(config, version.clone()))
            .await?;
    }

    checkpoint(ctx, "prune")?;
    let retention = prune(ctx).await?;
    let missing = check(ctx).await?;

    let wants_upload = options.upload && config.github.as_ref().is_some_and(|g| g.upload);
    let published = match (wants_upload, ctx.remote()) {
        (true, Some(host)) => {
            checkpoint(ctx, "publish")?;
            reporter.section("Publishing");
            let publisher = Publisher::new(config, host, reporter, &ctx.cancel);
            Some(publisher.publish(&version).await?)
        }
        (true, None) => {
            reporter.warning("No access token; skipping upload");
            None
        }
        (false, _) => None,
    };

    if let (Some(_), Some(github)) = (&published, &config.github) {
        reporter.success(&format!(
            "Uploaded {version}; review and publish the draft at {}",
            github.releases_page()
        ));
    }

    Ok(DeployOutcome {
        version,
        verdict,
        synced,
        retention,
        missing,
        published,
    })
}
