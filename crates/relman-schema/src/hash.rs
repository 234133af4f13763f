//! Content fingerprint of a manifest artifact.

use serde::{Deserialize, Serialize};

/// Newtype for an artifact content fingerprint as written in the manifest.
///
/// The value is opaque: it is produced by the packaging toolchain and only
/// ever compared for equality, so no format validation happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ArtifactHash(String);

impl ArtifactHash {
    /// Create a new `ArtifactHash` from the raw manifest field.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ArtifactHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ArtifactHash {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ArtifactHash {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
