//! Deployment configuration.
//!
//! Loaded once from `relman.toml` at startup and passed by reference into
//! every component. Nothing in this crate reads the environment; the access
//! token arrives through [`Credentials`], resolved by the binary.

use std::fmt;
use std::path::{Path, PathBuf};

use relman_schema::{ArtifactMarkers, DEFAULT_MANIFEST_NAME, DEFAULT_PACKAGE_EXTENSION};
use serde::Deserialize;
use thiserror::Error;

/// Default number of delta packages kept by the retention engine.
pub const DEFAULT_KEEP_DELTAS: usize = 4;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("An access token is set but relman.toml has no [github] section")]
    MissingGithub,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Access token contains characters that cannot be sent in a header")]
    InvalidToken,
}

/// Top-level configuration parsed from `relman.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Package id used in artifact filenames (`<package>-<version>-full.nupkg`).
    pub package_name: String,
    /// Persistent release directory holding packages and the manifest.
    pub release_dir: PathBuf,
    /// Scratch directory recreated on every deploy.
    pub staging_dir: PathBuf,
    /// Manifest file name, locally and as a remote asset.
    pub manifest_name: String,
    /// Extension of package artifacts, including the dot.
    pub package_extension: String,
    /// Filename substrings that classify full and delta packages.
    pub markers: ArtifactMarkers,
    /// Retention policy.
    pub retention: RetentionPolicy,
    /// Remote host settings. Absent means local-only operation.
    pub github: Option<GithubConfig>,
    /// Version numbering.
    pub version: VersionConfig,
    /// External build steps.
    pub build: BuildConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            package_name: String::new(),
            release_dir: PathBuf::from("releases"),
            staging_dir: PathBuf::from("staging"),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            markers: ArtifactMarkers::default(),
            retention: RetentionPolicy::default(),
            github: None,
            version: VersionConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

/// Retention policy: one full package plus a bounded window of deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionPolicy {
    /// Maximum number of delta packages to keep (newest by manifest order).
    pub keep_deltas: usize,
    /// Keep going (and still drop the record) when a file cannot be deleted.
    pub proceed_on_error: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_deltas: DEFAULT_KEEP_DELTAS,
            proceed_on_error: false,
        }
    }
}

/// GitHub releases settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Upload artifacts after a successful build.
    #[serde(default)]
    pub upload: bool,
    /// Consider draft releases when picking the publish target.
    #[serde(default = "default_true")]
    pub include_drafts: bool,
    /// Timeout for API calls, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Timeout for a single asset transfer, in seconds.
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

impl GithubConfig {
    /// Create settings for `owner/repo` with every other field defaulted.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            api_url: default_api_url(),
            upload: false,
            include_drafts: true,
            timeout_secs: default_timeout(),
            upload_timeout_secs: default_upload_timeout(),
        }
    }

    /// Public page listing the repository's releases.
    pub fn releases_page(&self) -> String {
        format!("https://github.com/{}/{}/releases", self.owner, self.repo)
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_upload_timeout() -> u64 {
    240
}

/// Version numbering settings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionConfig {
    /// Bump the per-day counter when today's base was already released.
    pub increment: bool,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self { increment: true }
    }
}

/// External build steps run before retention.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Commands run in order; any failure aborts the deploy.
    pub steps: Vec<BuildStep>,
}

/// One external command.
///
/// `args` may contain `{version}`, `{staging}`, `{releases}` and `{package}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildStep {
    /// Executable to run.
    pub program: String,
    /// Arguments, with placeholders expanded per run.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; defaults to the config file's directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl DeployConfig {
    /// Create a configuration for `package_name` releasing into `release_dir`.
    pub fn new(package_name: impl Into<String>, release_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_name: package_name.into(),
            release_dir: release_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// Relative directories are resolved against the file's parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration text, resolving relative paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema or
    /// fails validation.
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: DeployConfig =
            toml::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;

        config.release_dir = resolve(base, &config.release_dir);
        config.staging_dir = resolve(base, &config.staging_dir);
        for step in &mut config.build.steps {
            step.working_dir = Some(match step.working_dir.take() {
                Some(dir) => resolve(base, &dir),
                None => base.to_path_buf(),
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the crate relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.package_name.is_empty() {
            return Err(ConfigError::Invalid("package_name must be set".into()));
        }
        if self.package_name.contains(' ') {
            return Err(ConfigError::Invalid(
                "package_name may not contain spaces".into(),
            ));
        }
        if self.manifest_name.is_empty()
            || Path::new(&self.manifest_name).file_name()
                != Some(std::ffi::OsStr::new(&self.manifest_name))
        {
            return Err(ConfigError::Invalid(format!(
                "manifest_name '{}' must be a plain file name",
                self.manifest_name
            )));
        }
        if self.markers.full.is_empty() || self.markers.delta.is_empty() {
            return Err(ConfigError::Invalid("markers may not be empty".into()));
        }
        if self.release_dir == self.staging_dir {
            return Err(ConfigError::Invalid(
                "release_dir and staging_dir must differ".into(),
            ));
        }
        Ok(())
    }

    /// Path of the local manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.release_dir.join(&self.manifest_name)
    }

    /// Filename of the full package for `version`.
    pub fn full_package_name(&self, version: &str) -> String {
        format!(
            "{}-{}{}{}",
            self.package_name, version, self.markers.full, self.package_extension
        )
    }

    /// Whether a remote asset name is one the sync client should fetch.
    pub fn is_syncable(&self, name: &str) -> bool {
        name == self.manifest_name || name.ends_with(&self.package_extension)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Access token for the remote host, resolved once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    token: Option<String>,
}

impl Credentials {
    /// Wrap an optional token. Empty strings count as absent.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// The token, if one was supplied.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether remote operations are possible at all.
    pub fn is_present(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
