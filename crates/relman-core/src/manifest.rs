//! Loading and persisting the release manifest file.
//!
//! The manifest is always read and written whole. Writes go to a dotfile
//! next to the target and are renamed into place, so a reader never sees a
//! partially written manifest and the publisher never uploads the temp file.

use std::path::{Path, PathBuf};

use relman_schema::{MalformedManifestError, Manifest};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ManifestIoError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed manifest {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: MalformedManifestError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Read and parse the manifest at `path`.
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load(path: &Path) -> Result<Option<Manifest>, ManifestIoError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ManifestIoError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    Manifest::parse(&content)
        .map(Some)
        .map_err(|source| ManifestIoError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Like [`load`], but a missing file is an empty manifest.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_or_empty(path: &Path) -> Result<Manifest, ManifestIoError> {
    Ok(load(path).await?.unwrap_or_default())
}

/// Raw manifest bytes, or `None` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>, ManifestIoError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ManifestIoError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Atomically persist `manifest` to `path`.
///
/// # Errors
///
/// Returns an error if the temp file cannot be written or renamed.
pub async fn save(path: &Path, manifest: &Manifest) -> Result<(), ManifestIoError> {
    let write_err = |source| ManifestIoError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&temp_path, manifest.serialize())
        .await
        .map_err(write_err)?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        fs::remove_file(&temp_path).await.ok();
        return Err(write_err(e));
    }

    Ok(())
}
