//! Retention engine: bounds the release directory to one full package plus
//! the newest `keep_deltas` delta packages.
//!
//! "Newest" is purely manifest position (append order). Filesystem
//! timestamps and version strings are never consulted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use relman_schema::{ArtifactKind, ArtifactMarkers, ArtifactRecord, Manifest};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::Reporter;
use crate::config::{DeployConfig, RetentionPolicy};
use crate::manifest::{self, ManifestIoError};

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error(transparent)]
    Manifest(#[from] ManifestIoError),

    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Which records survive and which are pruned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPlan {
    /// The manifest after pruning, in original order.
    pub keep: Manifest,
    /// Records to delete, in original order.
    pub remove: Vec<ArtifactRecord>,
}

impl RetentionPlan {
    /// Whether the plan changes anything.
    pub fn is_noop(&self) -> bool {
        self.remove.is_empty()
    }
}

/// Compute the retention plan for `manifest`. Pure; touches nothing on disk.
pub fn plan(
    manifest: &Manifest,
    markers: &ArtifactMarkers,
    policy: &RetentionPolicy,
) -> RetentionPlan {
    let fulls: Vec<&ArtifactRecord> = manifest.of_kind(markers, ArtifactKind::Full).collect();
    let deltas: Vec<&ArtifactRecord> = manifest.of_kind(markers, ArtifactKind::Delta).collect();

    let stale_fulls = fulls.len().saturating_sub(1);
    let stale_deltas = deltas.len().saturating_sub(policy.keep_deltas);

    let doomed: HashSet<String> = fulls[..stale_fulls]
        .iter()
        .chain(&deltas[..stale_deltas])
        .map(|r| r.filename.clone())
        .collect();

    let remove = manifest
        .iter()
        .filter(|r| doomed.contains(&r.filename))
        .cloned()
        .collect();

    let mut keep = manifest.clone();
    keep.remove_filenames(&doomed);

    RetentionPlan { keep, remove }
}

/// Outcome of a retention run.
#[derive(Debug, Clone, Default)]
pub struct RetentionReport {
    /// Records dropped from the manifest.
    pub removed: Vec<ArtifactRecord>,
    /// Pruned records whose file was already gone.
    pub already_missing: Vec<String>,
    /// Files that could not be deleted (only with `proceed_on_error`).
    pub failed_deletes: Vec<String>,
    /// Whether the manifest file was rewritten.
    pub persisted: bool,
}

/// A manifest record with no file in the release directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAsset {
    /// Filename listed in the manifest.
    pub filename: String,
    /// Classification of the record.
    pub kind: ArtifactKind,
}

/// Applies the retention policy to a release directory and its manifest.
pub struct RetentionEngine<'a> {
    config: &'a DeployConfig,
    reporter: &'a dyn Reporter,
}

impl<'a> RetentionEngine<'a> {
    pub fn new(config: &'a DeployConfig, reporter: &'a dyn Reporter) -> Self {
        Self { config, reporter }
    }

    /// Prune the release directory.
    ///
    /// A missing manifest is treated as empty and nothing happens. The
    /// manifest is rewritten only when records were removed, so an already
    /// pruned directory is left byte-for-byte identical.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded or persisted, or if
    /// a file cannot be deleted and `proceed_on_error` is off. In the latter
    /// case the manifest and every package file are left as they were: files
    /// are parked under hidden names first and only removed once the new
    /// manifest is saved.
    pub async fn run(&self) -> Result<RetentionReport, RetentionError> {
        let manifest_path = self.config.manifest_path();
        let Some(current) = manifest::load(&manifest_path).await? else {
            debug!("No manifest at {}, nothing to prune", manifest_path.display());
            return Ok(RetentionReport::default());
        };

        let pruning = plan(&current, &self.config.markers, &self.config.retention);
        if pruning.is_noop() {
            debug!("Retention: nothing to prune ({} records)", current.len());
            return Ok(RetentionReport::default());
        }

        let mut report = RetentionReport::default();
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
        for record in &pruning.remove {
            let path = self.config.release_dir.join(&record.filename);
            let hidden = staged_path(&path);
            self.reporter.removing(&record.filename);

            match stage(&path, &hidden).await {
                Ok(()) => staged.push((path, hidden)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("{} was already gone", path.display());
                    report.already_missing.push(record.filename.clone());
                }
                Err(source) if self.config.retention.proceed_on_error => {
                    warn!("Failed to delete {}: {source}", path.display());
                    self.reporter
                        .failed(&record.filename, &format!("could not delete: {source}"));
                    report.failed_deletes.push(record.filename.clone());
                }
                Err(source) => {
                    self.reporter.failed(&record.filename, "could not delete");
                    restore(&staged).await;
                    return Err(RetentionError::Delete { path, source });
                }
            }
        }

        if let Err(e) = manifest::save(&manifest_path, &pruning.keep).await {
            restore(&staged).await;
            return Err(e.into());
        }

        for (path, hidden) in &staged {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match tokio::fs::remove_file(hidden).await {
                Ok(()) => {
                    info!("Removed old package {name}");
                    let size = pruning
                        .remove
                        .iter()
                        .find(|r| r.filename == name)
                        .map(|r| r.size);
                    self.reporter.done(&name, "removed", size);
                }
                Err(source) => {
                    // The record is already gone from the manifest; only a hidden leftover remains.
                    warn!("Failed to remove {}: {source}", hidden.display());
                    report.failed_deletes.push(name);
                }
            }
        }

        report.removed = pruning.remove;
        report.persisted = true;
        Ok(report)
    }
}

/// Hidden name a pruned file is parked under until the manifest is saved.
fn staged_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.prune"))
}

async fn stage(path: &Path, hidden: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    if meta.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::IsADirectory,
            "expected a package file, found a directory",
        ));
    }
    tokio::fs::rename(path, hidden).await
}

/// Move staged files back under their original names.
async fn restore(staged: &[(PathBuf, PathBuf)]) {
    for (path, hidden) in staged.iter().rev() {
        if let Err(e) = tokio::fs::rename(hidden, path).await {
            warn!("Failed to restore {}: {e}", path.display());
        }
    }
}

/// List manifest records whose file is absent from `release_dir`.
///
/// Each hit is logged as a warning; none of them is an error.
pub fn check_release_files(
    release_dir: &Path,
    manifest: &Manifest,
    markers: &ArtifactMarkers,
) -> Vec<MissingAsset> {
    manifest
        .iter()
        .filter(|r| !release_dir.join(&r.filename).is_file())
        .map(|r| {
            warn!("Local file missing: {}", r.filename);
            MissingAsset {
                filename: r.filename.clone(),
                kind: markers.classify(r),
            }
        })
        .collect()
}
