//! Shared types for relman: the release manifest and its artifact records.

pub mod hash;
pub mod manifest;

// Re-exports
pub use hash::ArtifactHash;
pub use manifest::{ArtifactKind, ArtifactMarkers, ArtifactRecord, MalformedManifestError, Manifest};

/// Conventional name of the manifest file, both locally and as a remote asset.
pub const DEFAULT_MANIFEST_NAME: &str = "RELEASES";

/// Conventional extension of package artifacts.
pub const DEFAULT_PACKAGE_EXTENSION: &str = ".nupkg";
