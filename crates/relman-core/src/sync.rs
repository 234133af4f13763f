//! Rebuilding the local release directory from a remote release.

use relman_schema::Manifest;
use tokio_util::sync::CancellationToken;

use crate::Reporter;
use crate::config::DeployConfig;
use crate::io::download::{DownloadError, checked_name};
use crate::io::fs::refresh_directory;
use crate::remote::{RemoteAsset, RemoteHost};

/// What a refresh fetched.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub downloaded: Vec<String>,
    pub bytes: u64,
    /// Parsed remote manifest, if the release carried one.
    pub manifest: Option<Manifest>,
}

/// Assets worth fetching, manifest first, otherwise in listing order.
pub fn select_assets<'a>(config: &DeployConfig, assets: &'a [RemoteAsset]) -> Vec<&'a RemoteAsset> {
    let mut selected: Vec<&RemoteAsset> = assets
        .iter()
        .filter(|a| config.is_syncable(&a.name))
        .collect();
    selected.sort_by_key(|a| a.name != config.manifest_name);
    selected
}

/// Downloads remote assets into the release directory.
pub struct SyncClient<'a> {
    config: &'a DeployConfig,
    host: &'a dyn RemoteHost,
    reporter: &'a dyn Reporter,
    cancel: &'a CancellationToken,
}

impl<'a> SyncClient<'a> {
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

    /// Wipe the release directory and repopulate it from `assets`.
    ///
    /// The first failure aborts the batch. Files already fetched stay on
    /// disk; the caller treats the whole refresh as failed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures, size mismatches, an
    /// unparsable manifest, unsafe asset names, or cancellation.
    pub async fn refresh(&self, assets: &[RemoteAsset]) -> Result<SyncReport, DownloadError> {
        let selected = select_assets(self.config, assets);
        for asset in &selected {
            checked_name(&asset.name)?;
        }

        refresh_directory(&self.config.release_dir).await?;
        tracing::info!(
            "refreshing {} from {} remote assets",
            self.config.release_dir.display(),
            selected.len()
        );

        let mut report = SyncReport::default();
        for asset in selected {
            if self.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled(asset.name.clone()));
            }

            match self.fetch(asset).await {
                Ok(written) => {
                    report.bytes += written;
                    report.downloaded.push(asset.name.clone());
                    self.reporter.done(&asset.name, "downloaded", Some(written));
                }
                Err(e) => {
                    self.reporter.failed(&asset.name, &e.to_string());
                    return Err(e);
                }
            }

            if asset.name == self.config.manifest_name {
                let text = tokio::fs::read_to_string(self.config.manifest_path()).await?;
                report.manifest = Some(Manifest::parse(&text)?);
            }
        }

        Ok(report)
    }

    async fn fetch(&self, asset: &RemoteAsset) -> Result<u64, DownloadError> {
        let dest = self.config.release_dir.join(&asset.name);
        let advertised = asset.size;
        let progress = |current: u64, total: Option<u64>| {
            self.reporter
                .downloading(&asset.name, current, total.or(Some(advertised)));
        };

        let written = self.host.download_asset(asset.id, &dest, &progress).await?;
        if written != advertised {
            tokio::fs::remove_file(&dest).await.ok();
            return Err(DownloadError::SizeMismatch {
                name: asset.name.clone(),
                expected: advertised,
                actual: written,
            });
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use crate::remote::fake::FakeHost;

    const MANIFEST: &str = "h4 kumi-1.2-full.nupkg 4\nh5 kumi-1.2-1.3-delta.nupkg 5\n";

    fn seeded_host() -> (FakeHost, Vec<RemoteAsset>) {
        let host = FakeHost::new();
        let release = host.add_release("1.2", false);
        host.add_asset(release.id, "kumi-1.2-full.nupkg", b"full");
        host.add_asset(release.id, "install.exe", b"setup");
        host.add_asset(release.id, "kumi-1.2-1.3-delta.nupkg", b"delta");
        host.add_asset(release.id, "RELEASES", MANIFEST.as_bytes());
        let assets = host.state.lock().unwrap().assets[&release.id].clone();
        (host, assets)
    }

    #[test]
    fn selection_puts_manifest_first_and_skips_others() {
        let (_, assets) = seeded_host();
        let config = DeployConfig::new("kumi", "releases");
        let names: Vec<_> = select_assets(&config, &assets)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(
            names,
            ["RELEASES", "kumi-1.2-full.nupkg", "kumi-1.2-1.3-delta.nupkg"]
        );
    }

    #[tokio::test]
    async fn refresh_replaces_directory_contents() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeployConfig::new("kumi", dir.path().join("releases"));
        std::fs::create_dir_all(&config.release_dir).unwrap();
        std::fs::write(config.release_dir.join("stale.nupkg"), b"old").unwrap();
        std::fs::write(config.manifest_path(), "h0 stale.nupkg 3\n").unwrap();

        let (host, assets) = seeded_host();
        let cancel = CancellationToken::new();
        let report = SyncClient::new(&config, &host, &NullReporter, &cancel)
            .refresh(&assets)
            .await
            .unwrap();

        assert_eq!(host.downloads()[0], "RELEASES");
        assert_eq!(report.downloaded.len(), 3);
        assert_eq!(report.bytes, MANIFEST.len() as u64 + 9);
        assert_eq!(report.manifest.unwrap().len(), 2);

        let mut files: Vec<_> = std::fs::read_dir(&config.release_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(
            files,
            ["RELEASES", "kumi-1.2-1.3-delta.nupkg", "kumi-1.2-full.nupkg"]
        );
        assert_eq!(std::fs::read_to_string(config.manifest_path()).unwrap(), MANIFEST);
    }

    #[tokio::test]
    async fn malformed_remote_manifest_aborts_before_packages() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeployConfig::new("kumi", dir.path().join("releases"));
        let host = FakeHost::new();
        let release = host.add_release("1.2", false);
        host.add_asset(release.id, "kumi-1.2-full.nupkg", b"full");
        host.add_asset(release.id, "RELEASES", b"not a manifest\n");
        let assets = host.state.lock().unwrap().assets[&release.id].clone();

        let cancel = CancellationToken::new();
        let err = SyncClient::new(&config, &host, &NullReporter, &cancel)
            .refresh(&assets)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Manifest(_)));
        assert_eq!(host.downloads(), ["RELEASES"]);
    }

    #[tokio::test]
    async fn size_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeployConfig::new("kumi", dir.path().join("releases"));
        let (host, mut assets) = seeded_host();
        assets.retain(|a| a.name == "kumi-1.2-full.nupkg");
        assets[0].size = 999;

        let cancel = CancellationToken::new();
        let err = SyncClient::new(&config, &host, &NullReporter, &cancel)
            .refresh(&assets)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadError::SizeMismatch {
                expected: 999,
                actual: 4,
                ..
            }
        ));
        assert!(!config.release_dir.join("kumi-1.2-full.nupkg").exists());
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_download() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeployConfig::new("kumi", dir.path().join("releases"));
        let (host, assets) = seeded_host();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = SyncClient::new(&config, &host, &NullReporter, &cancel)
            .refresh(&assets)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Cancelled(name) if name == "RELEASES"));
        assert!(host.downloads().is_empty());
    }

    #[derive(Default)]
    struct RecordingReporter {
        progress: std::sync::Mutex<Vec<(String, u64, Option<u64>)>>,
    }

    impl Reporter for RecordingReporter {
        fn section(&self, _: &str) {}
        fn downloading(&self, name: &str, current: u64, total: Option<u64>) {
            self.progress
                .lock()
                .unwrap()
                .push((name.to_string(), current, total));
        }
        fn uploading(&self, _: &str, _: u64) {}
        fn removing(&self, _: &str) {}
        fn done(&self, _: &str, _: &str, _: Option<u64>) {}
        fn failed(&self, _: &str, _: &str) {}
        fn info(&self, _: &str) {}
        fn success(&self, _: &str) {}
        fn warning(&self, _: &str) {}
        fn error(&self, _: &str) {}
    }

    #[tokio::test]
    async fn download_progress_reaches_the_reporter() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeployConfig::new("kumi", dir.path().join("releases"));
        let (host, mut assets) = seeded_host();
        assets.retain(|a| a.name == "kumi-1.2-full.nupkg");

        let reporter = RecordingReporter::default();
        let cancel = CancellationToken::new();
        SyncClient::new(&config, &host, &reporter, &cancel)
            .refresh(&assets)
            .await
            .unwrap();

        let progress = reporter.progress.lock().unwrap();
        assert_eq!(
            *progress,
            vec![
                ("kumi-1.2-full.nupkg".to_string(), 2, Some(4)),
                ("kumi-1.2-full.nupkg".to_string(), 4, Some(4)),
            ]
        );
    }

    #[tokio::test]
    async fn path_traversal_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeployConfig::new("kumi", dir.path().join("releases"));
        let assets = vec![RemoteAsset {
            id: 1,
            name: "../evil.nupkg".to_string(),
            size: 1,
        }];

        let cancel = CancellationToken::new();
        let err = SyncClient::new(&config, &FakeHost::new(), &NullReporter, &cancel)
            .refresh(&assets)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidName(_)));
    }
}
