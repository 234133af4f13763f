//! Remote release host abstraction.
//!
//! The core only needs a handful of operations from the host; [`github`]
//! implements them over the GitHub REST API. Whether a host is available at
//! all is decided once at startup by [`connect`].

pub mod github;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, Credentials, DeployConfig};
use crate::io::download::DownloadError;

pub use github::GitHubHost;

/// Progress callback: bytes received so far and the expected total.
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Release '{0}' has no asset upload endpoint")]
    MissingUploadUrl(String),
}

/// One published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    pub id: u64,
    /// Display name. GitHub reports `null` for releases created without one.
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    /// Upload endpoint, possibly an RFC 6570 template (`...assets{?name,label}`).
    #[serde(default)]
    pub upload_url: String,
}

impl ReleaseDescriptor {
    /// Display name, falling back to the tag.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.tag_name)
    }

    /// Upload endpoint with any URI template suffix removed.
    pub fn upload_endpoint(&self) -> Result<&str, RemoteError> {
        let endpoint = self
            .upload_url
            .split_once('{')
            .map_or(self.upload_url.as_str(), |(base, _)| base);
        if endpoint.is_empty() {
            return Err(RemoteError::MissingUploadUrl(self.tag_name.clone()));
        }
        Ok(endpoint)
    }
}

/// One file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// Operations the core needs from the release host.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// All releases, newest first as ordered by the host.
    async fn list_releases(&self) -> Result<Vec<ReleaseDescriptor>, RemoteError>;

    /// Assets attached to a release.
    async fn list_assets(&self, release_id: u64) -> Result<Vec<RemoteAsset>, RemoteError>;

    /// Fetch an asset's full content into memory.
    async fn fetch_asset_bytes(&self, asset_id: u64) -> Result<Bytes, RemoteError>;

    /// Stream an asset into `dest`, reporting progress. Returns bytes written.
    async fn download_asset(
        &self,
        asset_id: u64,
        dest: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<u64, DownloadError>;

    /// Create a release whose name and tag are both `name`.
    async fn create_release(&self, name: &str, draft: bool)
    -> Result<ReleaseDescriptor, RemoteError>;

    /// Upload `bytes` as `filename` to a release's upload endpoint.
    async fn upload_asset(
        &self,
        upload_url: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<RemoteAsset, RemoteError>;

    /// Remove an asset from its release.
    async fn delete_asset(&self, asset_id: u64) -> Result<(), RemoteError>;
}

/// The most recent release, skipping drafts unless `include_drafts`.
///
/// # Errors
///
/// Returns an error if the release list cannot be fetched.
pub async fn latest_release(
    host: &dyn RemoteHost,
    include_drafts: bool,
) -> Result<Option<ReleaseDescriptor>, RemoteError> {
    Ok(host
        .list_releases()
        .await?
        .into_iter()
        .find(|r| include_drafts || !r.draft))
}

/// Resolve the remote capability once.
///
/// No token means local-only operation (`Ok(None)`), whatever the config
/// says.
///
/// # Errors
///
/// Returns an error if a token is present but the config has no `[github]`
/// section, or the HTTP client cannot be built.
pub fn connect(
    config: &DeployConfig,
    credentials: &Credentials,
) -> Result<Option<Arc<dyn RemoteHost>>, ConfigError> {
    let Some(token) = credentials.token() else {
        return Ok(None);
    };
    let github = config.github.as_ref().ok_or(ConfigError::MissingGithub)?;
    let host = GitHubHost::new(github, token)?;
    Ok(Some(Arc::new(host)))
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory host used by the divergence, sync and publish tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub(crate) struct State {
        pub releases: Vec<ReleaseDescriptor>,
        pub assets: HashMap<u64, Vec<RemoteAsset>>,
        pub contents: HashMap<u64, Vec<u8>>,
        pub downloads: Vec<String>,
        pub uploads: Vec<String>,
        pub deleted: Vec<u64>,
        pub fail_upload: Option<String>,
        next_id: u64,
    }

    #[derive(Debug, Default)]
    pub(crate) struct FakeHost {
        pub state: Mutex<State>,
    }

    impl FakeHost {
        pub fn new() -> Self {
            let host = Self::default();
            host.state.lock().unwrap().next_id = 1000;
            host
        }

        pub fn add_release(&self, tag: &str, draft: bool) -> ReleaseDescriptor {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let release = ReleaseDescriptor {
                id: state.next_id,
                name: Some(tag.to_string()),
                tag_name: tag.to_string(),
                draft,
                prerelease: false,
                upload_url: format!("fake://{}/assets{{?name,label}}", state.next_id),
            };
            // Host lists newest first
            state.releases.insert(0, release.clone());
            state.assets.insert(release.id, Vec::new());
            release
        }

        pub fn add_asset(&self, release_id: u64, name: &str, content: &[u8]) -> RemoteAsset {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let asset = RemoteAsset {
                id: state.next_id,
                name: name.to_string(),
                size: content.len() as u64,
            };
            state.contents.insert(asset.id, content.to_vec());
            state
                .assets
                .entry(release_id)
                .or_default()
                .push(asset.clone());
            asset
        }

        pub fn asset_names(&self, release_id: u64) -> Vec<String> {
            let state = self.state.lock().unwrap();
            state.assets[&release_id]
                .iter()
                .map(|a| a.name.clone())
                .collect()
        }

        pub fn content_of(&self, release_id: u64, name: &str) -> Option<Vec<u8>> {
            let state = self.state.lock().unwrap();
            let asset = state.assets[&release_id].iter().find(|a| a.name == name)?;
            state.contents.get(&asset.id).cloned()
        }

        pub fn downloads(&self) -> Vec<String> {
            self.state.lock().unwrap().downloads.clone()
        }

        pub fn uploads(&self) -> Vec<String> {
            self.state.lock().unwrap().uploads.clone()
        }
    }

    fn not_found() -> RemoteError {
        // Any reqwest::Error will do; build one from an invalid URL.
        RemoteError::Http(
            reqwest::Client::new()
                .get("not a url")
                .build()
                .unwrap_err(),
        )
    }

    #[async_trait]
    impl RemoteHost for FakeHost {
        async fn list_releases(&self) -> Result<Vec<ReleaseDescriptor>, RemoteError> {
            Ok(self.state.lock().unwrap().releases.clone())
        }

        async fn list_assets(&self, release_id: u64) -> Result<Vec<RemoteAsset>, RemoteError> {
            let state = self.state.lock().unwrap();
            state.assets.get(&release_id).cloned().ok_or_else(not_found)
        }

        async fn fetch_asset_bytes(&self, asset_id: u64) -> Result<Bytes, RemoteError> {
            let state = self.state.lock().unwrap();
            state
                .contents
                .get(&asset_id)
                .map(|c| Bytes::from(c.clone()))
                .ok_or_else(not_found)
        }

        async fn download_asset(
            &self,
            asset_id: u64,
            dest: &Path,
            progress: &ProgressFn<'_>,
        ) -> Result<u64, DownloadError> {
            let (name, content) = {
                let mut state = self.state.lock().unwrap();
                let content = state.contents.get(&asset_id).cloned().ok_or_else(not_found)?;
                let name = state
                    .assets
                    .values()
                    .flatten()
                    .find(|a| a.id == asset_id)
                    .map(|a| a.name.clone())
                    .unwrap_or_default();
                state.downloads.push(name.clone());
                (name, content)
            };
            let total = content.len() as u64;
            let half = content.len() / 2;
            progress(half as u64, Some(total));
            tokio::fs::write(dest, &content).await?;
            progress(total, Some(total));
            tracing::debug!("fake download of {name} complete");
            Ok(total)
        }

        async fn create_release(
            &self,
            name: &str,
            draft: bool,
        ) -> Result<ReleaseDescriptor, RemoteError> {
            Ok(self.add_release(name, draft))
        }

        async fn upload_asset(
            &self,
            upload_url: &str,
            filename: &str,
            bytes: Bytes,
        ) -> Result<RemoteAsset, RemoteError> {
            if self.state.lock().unwrap().fail_upload.as_deref() == Some(filename) {
                return Err(not_found());
            }
            let release_id: u64 = upload_url
                .trim_start_matches("fake://")
                .split('/')
                .next()
                .and_then(|id| id.parse().ok())
                .ok_or_else(not_found)?;
            let asset = self.add_asset(release_id, filename, &bytes);
            self.state
                .lock()
                .unwrap()
                .uploads
                .push(filename.to_string());
            Ok(asset)
        }

        async fn delete_asset(&self, asset_id: u64) -> Result<(), RemoteError> {
            let mut state = self.state.lock().unwrap();
            for assets in state.assets.values_mut() {
                assets.retain(|a| a.id != asset_id);
            }
            state.contents.remove(&asset_id);
            state.deleted.push(asset_id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(upload_url: &str) -> ReleaseDescriptor {
        ReleaseDescriptor {
            id: 1,
            name: None,
            tag_name: "2024.101.0".to_string(),
            draft: true,
            prerelease: false,
            upload_url: upload_url.to_string(),
        }
    }

    #[test]
    fn upload_endpoint_strips_uri_template() {
        let r = release("https://uploads.github.com/repos/o/r/releases/1/assets{?name,label}");
        assert_eq!(
            r.upload_endpoint().unwrap(),
            "https://uploads.github.com/repos/o/r/releases/1/assets"
        );
        assert!(matches!(
            release("").upload_endpoint(),
            Err(RemoteError::MissingUploadUrl(_))
        ));
    }

    #[test]
    fn display_name_falls_back_to_tag() {
        assert_eq!(release("x").display_name(), "2024.101.0");
    }

    #[test]
    fn release_json_tolerates_null_name() {
        let json = r#"{"id": 7, "name": null, "tag_name": "v1", "draft": false,
                       "prerelease": false, "upload_url": "u", "html_url": "ignored"}"#;
        let r: ReleaseDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, 7);
        assert_eq!(r.display_name(), "v1");
    }

    #[tokio::test]
    async fn latest_release_skips_drafts_unless_asked() {
        let host = fake::FakeHost::new();
        host.add_release("1.0", false);
        host.add_release("1.1", true);

        let latest = latest_release(&host, false).await.unwrap().unwrap();
        assert_eq!(latest.tag_name, "1.0");
        let latest = latest_release(&host, true).await.unwrap().unwrap();
        assert_eq!(latest.tag_name, "1.1");
    }

    #[test]
    fn connect_without_token_is_local_only() {
        let config = DeployConfig::new("app", "releases");
        assert!(connect(&config, &Credentials::new(None)).unwrap().is_none());
        assert!(matches!(
            connect(&config, &Credentials::new(Some("t".into()))),
            Err(ConfigError::MissingGithub)
        ));
    }
}
