//! Streaming asset downloads with progress reporting and size checks.
//!
//! Bytes land in a hidden `.part` file next to the destination and are
//! renamed into place only after the stream ends with the expected length.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use relman_schema::MalformedManifestError;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::remote::{ProgressFn, RemoteError};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Size mismatch for {name}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("Downloaded manifest is malformed: {0}")]
    Manifest(#[from] MalformedManifestError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Refusing to write asset with unsafe name '{0}'")]
    InvalidName(String),

    #[error("Download of {0} cancelled")]
    Cancelled(String),
}

/// Temp path used while `dest` is being written.
pub fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.part"))
}

/// Reject asset names that would escape the target directory.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidName`] for empty names, names with path
/// separators, or `.`/`..`.
pub fn checked_name(name: &str) -> Result<&str, DownloadError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(DownloadError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Drain `stream` into `dest`, reporting progress after every chunk.
///
/// Returns the number of bytes written. On any error the partial file is
/// removed and `dest` is left untouched.
///
/// # Errors
///
/// Returns an error if the stream fails, the file cannot be written, or
/// `total` is known and differs from the bytes received.
pub async fn write_stream<S, E>(
    mut stream: S,
    dest: &Path,
    total: Option<u64>,
    progress: &ProgressFn<'_>,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    DownloadError: From<E>,
{
    let part = partial_path(dest);
    let result = async {
        let mut file = File::create(&part).await?;
        let mut downloaded: u64 = 0;
        progress(0, total);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }
        file.flush().await?;

        match total {
            Some(expected) if expected != downloaded => Err(DownloadError::SizeMismatch {
                name: dest
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                expected,
                actual: downloaded,
            }),
            _ => Ok::<u64, DownloadError>(downloaded),
        }
    }
    .await;

    match result {
        Ok(downloaded) => {
            tokio::fs::rename(&part, dest).await?;
            Ok(downloaded)
        }
        Err(e) => {
            tokio::fs::remove_file(&part).await.ok();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn stream_is_written_with_progress() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("app-1.0-full.nupkg");
        let seen = Mutex::new(Vec::new());
        let progress = |current: u64, _: Option<u64>| seen.lock().unwrap().push(current);

        let written = write_stream(chunks(&[b"abc", b"defg"]), &dest, Some(7), &progress)
            .await
            .unwrap();

        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abcdefg");
        assert_eq!(*seen.lock().unwrap(), vec![0, 3, 7]);
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn short_stream_is_rejected_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("RELEASES");
        let progress = |_: u64, _: Option<u64>| {};

        let err = write_stream(chunks(&[b"abc"]), &dest, Some(10), &progress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadError::SizeMismatch {
                expected: 10,
                actual: 3,
                ..
            }
        ));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn stream_error_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.nupkg");
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let progress = |_: u64, _: Option<u64>| {};

        assert!(write_stream(stream, &dest, None, &progress).await.is_err());
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn unsafe_names_are_rejected() {
        assert!(checked_name("app-1.0-full.nupkg").is_ok());
        assert!(checked_name("../etc/passwd").is_err());
        assert!(checked_name("a\\b").is_err());
        assert!(checked_name("..").is_err());
        assert!(checked_name("").is_err());
    }
}
