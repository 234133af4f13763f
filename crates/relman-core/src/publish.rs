//! Uploading a built release directory to the remote host.
//!
//! The target release is created as a draft and never promoted here, so a
//! failed batch can simply be re-run. Assets already present are skipped,
//! except the manifest, which is replaced whenever its bytes changed.

use std::collections::HashMap;
use std::path::PathBuf;

use bytes::Bytes;
use relman_schema::Manifest;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::Reporter;
use crate::config::DeployConfig;
use crate::io::fs::is_hidden;
use crate::manifest::{self, ManifestIoError};
use crate::remote::{self, ReleaseDescriptor, RemoteAsset, RemoteError, RemoteHost};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Manifest(#[from] ManifestIoError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to upload {name}: {source}")]
    Asset { name: String, source: RemoteError },

    #[error("Publishing cancelled before {0}")]
    Cancelled(String),
}

/// What a publish run did.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub release: ReleaseDescriptor,
    /// Whether the release was created by this run.
    pub created: bool,
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    /// Whether a stale remote manifest was deleted and re-uploaded.
    pub replaced_manifest: bool,
}

/// Upload order for the files in a release directory.
///
/// Manifest packages come first, newest first, then any other files in
/// reverse name order, then the manifest itself. Hidden files are dropped.
pub fn order_uploads(files: &[String], manifest: &Manifest, manifest_name: &str) -> Vec<String> {
    let visible: Vec<&String> = files
        .iter()
        .filter(|f| !is_hidden(f) && f.as_str() != manifest_name)
        .collect();

    let mut ordered: Vec<String> = manifest
        .iter()
        .rev()
        .map(|r| &r.filename)
        .filter(|name| visible.contains(name))
        .cloned()
        .collect();

    let mut rest: Vec<String> = visible
        .into_iter()
        .filter(|f| manifest.get(f).is_none())
        .cloned()
        .collect();
    rest.sort_by(|a, b| b.cmp(a));
    ordered.extend(rest);

    if files.iter().any(|f| f == manifest_name) {
        ordered.push(manifest_name.to_string());
    }
    ordered
}

pub struct Publisher<'a> {
    config: &'a DeployConfig,
    host: &'a dyn RemoteHost,
    reporter: &'a dyn Reporter,
    cancel: &'a CancellationToken,
}

impl<'a> Publisher<'a> {
    pub fn new(
        config: &'a DeployConfig,
        host: &'a dyn RemoteHost,
        reporter: &'a dyn Reporter,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            host,
            reporter,
            cancel,
        }
    }

    fn include_drafts(&self) -> bool {
        self.config.github.as_ref().is_none_or(|g| g.include_drafts)
    }

    /// Reuse the latest release if it is tagged `version`, otherwise create
    /// a draft named and tagged `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be queried or refuses the new
    /// release.
    pub async fn ensure_release(
        &self,
        version: &str,
    ) -> Result<(ReleaseDescriptor, bool), UploadError> {
        let latest = remote::latest_release(self.host, self.include_drafts()).await?;
        if let Some(latest) = latest.filter(|r| r.tag_name == version) {
            tracing::debug!("reusing release {} ({})", latest.tag_name, latest.id);
            return Ok((latest, false));
        }

        self.reporter.info(&format!("Creating draft release {version}"));
        let release = self.host.create_release(version, true).await?;
        Ok((release, true))
    }

    /// Upload every visible file in the release directory to the release
    /// for `version`.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failed transfer, unreadable file, or
    /// when cancelled. The release stays a draft.
    pub async fn publish(&self, version: &str) -> Result<PublishReport, UploadError> {
        let (release, created) = self.ensure_release(version).await?;
        let endpoint = release.upload_endpoint()?.to_string();

        let existing: HashMap<String, RemoteAsset> = self
            .host
            .list_assets(release.id)
            .await?
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();

        let local_manifest = manifest::load_or_empty(&self.config.manifest_path()).await?;
        let files = self.list_files().await?;
        let order = order_uploads(&files, &local_manifest, &self.config.manifest_name);

        let mut report = PublishReport {
            release,
            created,
            uploaded: Vec::new(),
            skipped: Vec::new(),
            replaced_manifest: false,
        };

        for name in order {
            if self.cancel.is_cancelled() {
                return Err(UploadError::Cancelled(name));
            }

            let existing_asset = existing.get(&name);
            if let Some(asset) = existing_asset.filter(|_| name != self.config.manifest_name) {
                tracing::debug!("{name} already uploaded, skipping");
                self.reporter.done(&name, "already uploaded", Some(asset.size));
                report.skipped.push(name);
                continue;
            }

            let path = self.config.release_dir.join(&name);
            let bytes = tokio::fs::read(&path)
                .await
                .map(Bytes::from)
                .map_err(|source| UploadError::Read {
                    path: path.clone(),
                    source,
                })?;

            // Only the manifest can reach here with an existing remote copy
            if let Some(asset) = existing_asset {
                let remote = self.host.fetch_asset_bytes(asset.id).await?;
                if remote == bytes {
                    self.reporter.done(&name, "unchanged", Some(asset.size));
                    report.skipped.push(name);
                    continue;
                }
                tracing::info!("replacing remote {name}");
                self.host.delete_asset(asset.id).await?;
                report.replaced_manifest = true;
            }

            let size = bytes.len() as u64;
            self.reporter.uploading(&name, size);
            if let Err(source) = self.host.upload_asset(&endpoint, &name, bytes).await {
                self.reporter.failed(&name, &source.to_string());
                return Err(UploadError::Asset { name, source });
            }
            self.reporter.done(&name, "uploaded", Some(size));
            report.uploaded.push(name);
        }

        Ok(report)
    }

    async fn list_files(&self) -> Result<Vec<String>, UploadError> {
        let dir = &self.config.release_dir;
        let read_err = |source| UploadError::Read {
            path: dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            if entry.file_type().await.map_err(read_err)?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(files)
    }
}
