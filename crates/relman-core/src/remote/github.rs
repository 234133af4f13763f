//! GitHub Releases backend.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;

use super::{ProgressFn, ReleaseDescriptor, RemoteAsset, RemoteError, RemoteHost};
use crate::config::{ConfigError, GithubConfig};
use crate::io::download::{DownloadError, write_stream};

const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const BINARY_MEDIA_TYPE: &str = "application/octet-stream";

/// Release host backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubHost {
    client: Client,
    repo_url: String,
    transfer_timeout: Duration,
}

#[derive(Serialize)]
struct NewRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    draft: bool,
    prerelease: bool,
}

impl GitHubHost {
    /// Build a client for `config`'s repository authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the
    /// client cannot be constructed.
    pub fn new(config: &GithubConfig, token: &str) -> Result<Self, ConfigError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ConfigError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            repo_url: format!(
                "{}/repos/{}/{}",
                config.api_url.trim_end_matches('/'),
                config.owner,
                config.repo
            ),
            transfer_timeout: Duration::from_secs(config.upload_timeout_secs),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(format!("{}{path}", self.repo_url))
    }
}

#[async_trait]
impl RemoteHost for GitHubHost {
    async fn list_releases(&self) -> Result<Vec<ReleaseDescriptor>, RemoteError> {
        let releases = self
            .get("/releases")
            .query(&[("per_page", "100")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(releases)
    }

    async fn list_assets(&self, release_id: u64) -> Result<Vec<RemoteAsset>, RemoteError> {
        let assets = self
            .get(&format!("/releases/{release_id}/assets"))
            .query(&[("per_page", "100")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(assets)
    }

    async fn fetch_asset_bytes(&self, asset_id: u64) -> Result<Bytes, RemoteError> {
        let bytes = self
            .get(&format!("/releases/assets/{asset_id}"))
            .header(ACCEPT, BINARY_MEDIA_TYPE)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes)
    }

    async fn download_asset(
        &self,
        asset_id: u64,
        dest: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<u64, DownloadError> {
        let response = self
            .get(&format!("/releases/assets/{asset_id}"))
            .header(ACCEPT, BINARY_MEDIA_TYPE)
            .timeout(self.transfer_timeout)
            .send()
            .await?
            .error_for_status()?;

        let total = response.content_length();
        write_stream(Box::pin(response.bytes_stream()), dest, total, progress).await
    }

    async fn create_release(
        &self,
        name: &str,
        draft: bool,
    ) -> Result<ReleaseDescriptor, RemoteError> {
        let release = self
            .client
            .post(format!("{}/releases", self.repo_url))
            .json(&NewRelease {
                tag_name: name,
                name,
                draft,
                prerelease: false,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(release)
    }

    async fn upload_asset(
        &self,
        upload_url: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<RemoteAsset, RemoteError> {
        let asset = self
            .client
            .post(upload_url)
            .query(&[("name", filename)])
            .header(CONTENT_TYPE, BINARY_MEDIA_TYPE)
            .timeout(self.transfer_timeout)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(asset)
    }

    async fn delete_asset(&self, asset_id: u64) -> Result<(), RemoteError> {
        self.client
            .delete(format!("{}/releases/assets/{asset_id}", self.repo_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
