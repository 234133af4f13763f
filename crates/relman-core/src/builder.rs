//! External build toolchain.
//!
//! The core never compiles or packs anything itself. A [`Toolchain`] is
//! handed a [`BuildRequest`] and must leave one full package (plus any
//! deltas) in the release directory and update the manifest there.
//! [`CommandToolchain`] drives this from the `[[build.steps]]` table.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::{BuildStep, DeployConfig};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}\n{output}")]
    StepFailed {
        program: String,
        status: ExitStatus,
        output: String,
    },
}

/// Inputs for one build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub version: String,
    pub package_name: String,
    pub staging_dir: PathBuf,
    pub release_dir: PathBuf,
}

impl BuildRequest {
    /// Request for building `version` with the directories from `config`.
    pub fn new(config: &DeployConfig, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            package_name: config.package_name.clone(),
            staging_dir: config.staging_dir.clone(),
            release_dir: config.release_dir.clone(),
        }
    }

    /// Substitute `{version}`, `{staging}`, `{releases}` and `{package}`.
    pub fn expand(&self, arg: &str) -> String {
        arg.replace("{version}", &self.version)
            .replace("{staging}", &self.staging_dir.to_string_lossy())
            .replace("{releases}", &self.release_dir.to_string_lossy())
            .replace("{package}", &self.package_name)
    }
}

/// Something that can turn a version into release artifacts.
#[async_trait]
pub trait Toolchain: Send + Sync {
    async fn produce(&self, request: &BuildRequest) -> Result<(), BuildError>;
}

/// Runs configured commands in order, stopping at the first failure.
#[derive(Debug, Clone, Default)]
pub struct CommandToolchain {
    steps: Vec<BuildStep>,
}

impl CommandToolchain {
    pub fn new(steps: Vec<BuildStep>) -> Self {
        Self { steps }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(config.build.steps.clone())
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn produce(&self, request: &BuildRequest) -> Result<(), BuildError> {
        if self.steps.is_empty() {
            tracing::debug!("no build steps configured");
        }

        for step in &self.steps {
            let args: Vec<String> = step.args.iter().map(|a| request.expand(a)).collect();
            tracing::info!("running {} {}", step.program, args.join(" "));

            let mut cmd = Command::new(&step.program);
            cmd.args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            if let Some(dir) = &step.working_dir {
                cmd.current_dir(dir);
            }

            let output = cmd.output().await.map_err(|source| BuildError::Spawn {
                program: step.program.clone(),
                source,
            })?;

            if !output.status.success() {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                return Err(BuildError::StepFailed {
                    program: step.program.clone(),
                    status: output.status,
                    output: text.trim_end().to_string(),
                });
            }
        }

        Ok(())
    }
}
