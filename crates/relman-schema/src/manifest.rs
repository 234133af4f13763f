//! Release manifest model.
//!
//! The manifest is a plain text file with one artifact per line:
//!
//! ```text
//! <hash> <filename> <size-bytes>
//! ```
//!
//! Fields are separated by a single space and are never escaped, so neither
//! the hash nor the filename may contain a space. Line order is significant:
//! records are appended in build order, and the last full package is the
//! current baseline.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::ArtifactHash;

/// UTF-8 byte order mark some packers prepend to the manifest.
const BOM: char = '\u{feff}';

/// Errors raised while parsing manifest text.
///
/// `line` is 1-based and counts every line of the input, including blank ones.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedManifestError {
    /// A line has fewer than three space-separated fields.
    #[error("line {line}: expected 3 fields (hash, filename, size), found {found}")]
    MissingFields {
        /// Offending line.
        line: usize,
        /// Number of fields present.
        found: usize,
    },

    /// The size field is not a non-negative integer.
    #[error("line {line}: size '{value}' is not a non-negative integer")]
    InvalidSize {
        /// Offending line.
        line: usize,
        /// The raw size field.
        value: String,
    },

    /// The same filename is listed twice.
    #[error("line {line}: duplicate filename '{filename}'")]
    DuplicateFilename {
        /// Line of the second occurrence.
        line: usize,
        /// The repeated filename.
        filename: String,
    },
}

/// Classification of an artifact, derived from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A complete, self-contained package for one version.
    Full,
    /// A patch between two versions.
    Delta,
    /// Anything else listed in the manifest.
    Other,
}

/// Filename substrings that mark full and delta packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactMarkers {
    /// Substring identifying a full package (e.g. `-full`).
    pub full: String,
    /// Substring identifying a delta package (e.g. `-delta`).
    pub delta: String,
}

impl Default for ArtifactMarkers {
    fn default() -> Self {
        Self {
            full: "-full".to_string(),
            delta: "-delta".to_string(),
        }
    }
}

impl ArtifactMarkers {
    /// Create markers from explicit substrings.
    pub fn new(full: impl Into<String>, delta: impl Into<String>) -> Self {
        Self {
            full: full.into(),
            delta: delta.into(),
        }
    }

    /// Classify a filename. The full marker wins when both match.
    pub fn classify_name(&self, filename: &str) -> ArtifactKind {
        if filename.contains(&self.full) {
            ArtifactKind::Full
        } else if filename.contains(&self.delta) {
            ArtifactKind::Delta
        } else {
            ArtifactKind::Other
        }
    }

    /// Classify a manifest record by its filename.
    pub fn classify(&self, record: &ArtifactRecord) -> ArtifactKind {
        self.classify_name(&record.filename)
    }
}

/// One line of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRecord {
    /// Content fingerprint, compared by equality only.
    pub hash: ArtifactHash,
    /// File name inside the release directory; unique within a manifest.
    pub filename: String,
    /// Artifact size in bytes.
    pub size: u64,
}

impl ArtifactRecord {
    /// Create a new record.
    pub fn new(hash: impl Into<ArtifactHash>, filename: impl Into<String>, size: u64) -> Self {
        Self {
            hash: hash.into(),
            filename: filename.into(),
            size,
        }
    }

    fn parse_line(line_no: usize, line: &str) -> Result<Self, MalformedManifestError> {
        // Anything past the third field is ignored.
        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() < 3 {
            return Err(MalformedManifestError::MissingFields {
                line: line_no,
                found: fields.len(),
            });
        }

        let size = fields[2]
            .parse::<u64>()
            .map_err(|_| MalformedManifestError::InvalidSize {
                line: line_no,
                value: fields[2].to_string(),
            })?;

        Ok(Self::new(fields[0], fields[1], size))
    }
}

impl fmt::Display for ArtifactRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.hash, self.filename, self.size)
    }
}

/// Ordered list of artifact records, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    records: Vec<ArtifactRecord>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest text.
    ///
    /// Blank lines are skipped, `\r\n` line endings and a leading byte order
    /// mark are tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedManifestError`] on the first line that has fewer
    /// than three fields, whose size is not a non-negative integer,
    /// or whose filename was already listed.
    pub fn parse(text: &str) -> Result<Self, MalformedManifestError> {
        let text = text.strip_prefix(BOM).unwrap_or(text);
        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = ArtifactRecord::parse_line(idx + 1, line)?;
            if !seen.insert(record.filename.clone()) {
                return Err(MalformedManifestError::DuplicateFilename {
                    line: idx + 1,
                    filename: record.filename,
                });
            }
            records.push(record);
        }

        Ok(Self { records })
    }

    /// Render the manifest text: one record per line, `\n` terminated.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Records in manifest order.
    pub fn records(&self) -> &[ArtifactRecord] {
        &self.records
    }

    /// Iterate over records in manifest order.
    pub fn iter(&self) -> std::slice::Iter<'_, ArtifactRecord> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the manifest has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by filename.
    pub fn get(&self, filename: &str) -> Option<&ArtifactRecord> {
        self.records.iter().find(|r| r.filename == filename)
    }

    /// Append a record. Returns `false` (and leaves the manifest untouched)
    /// if a record with the same filename is already present.
    pub fn push(&mut self, record: ArtifactRecord) -> bool {
        if self.get(&record.filename).is_some() {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Drop every record whose filename is in `filenames`, keeping order.
    pub fn remove_filenames(&mut self, filenames: &HashSet<String>) {
        self.records.retain(|r| !filenames.contains(&r.filename));
    }

    /// Records of one kind, in manifest order.
    pub fn of_kind<'a>(
        &'a self,
        markers: &ArtifactMarkers,
        kind: ArtifactKind,
    ) -> impl Iterator<Item = &'a ArtifactRecord> {
        self.records
            .iter()
            .filter(move |r| markers.classify(r) == kind)
    }

    /// The current baseline: the last full package in manifest order.
    pub fn latest_full(&self, markers: &ArtifactMarkers) -> Option<&ArtifactRecord> {
        self.records
            .iter()
            .rfind(|r| markers.classify(r) == ArtifactKind::Full)
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{record}")?;
        }
        Ok(())
    }
}

impl FromStr for Manifest {
    type Err = MalformedManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromIterator<ArtifactRecord> for Manifest {
    fn from_iter<I: IntoIterator<Item = ArtifactRecord>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for record in iter {
            manifest.push(record);
        }
        manifest
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ArtifactRecord;
    type IntoIter = std::slice::Iter<'a, ArtifactRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str = "h1 app-1.0-full.nupkg 1000\n\
                              h2 app-1.0-1.1-delta.nupkg 50\n\
                              h3 app-1.1-1.2-delta.nupkg 60\n\
                              h4 app-1.2-full.nupkg 1100\n\
                              h5 app-1.2-1.3-delta.nupkg 40\n";

    #[test]
    fn parse_reads_records_in_order() {
        let manifest = Manifest::parse(SCENARIO_A).unwrap();
        assert_eq!(manifest.len(), 5);
        assert_eq!(manifest.records()[0].hash.as_str(), "h1");
        assert_eq!(manifest.records()[0].filename, "app-1.0-full.nupkg");
        assert_eq!(manifest.records()[0].size, 1000);
        assert_eq!(manifest.records()[4].filename, "app-1.2-1.3-delta.nupkg");
    }

    #[test]
    fn serialize_round_trips_system_output() {
        let manifest = Manifest::parse(SCENARIO_A).unwrap();
        assert_eq!(manifest.serialize(), SCENARIO_A);
        assert_eq!(Manifest::parse(&manifest.serialize()).unwrap(), manifest);
    }

    #[test]
    fn empty_manifest_serializes_to_empty_text() {
        assert_eq!(Manifest::new().serialize(), "");
        assert!(Manifest::parse("").unwrap().is_empty());
        assert!(Manifest::parse("\n\n").unwrap().is_empty());
    }

    #[test]
    fn parse_tolerates_crlf_and_bom() {
        let text = "\u{feff}AB12 app-1.0-full.nupkg 10\r\nCD34 app-1.0-1.1-delta.nupkg 2\r\n";
        let manifest = Manifest::parse(text).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.records()[0].hash.as_str(), "AB12");
        assert_eq!(manifest.records()[1].size, 2);
    }

    #[test]
    fn parse_rejects_short_lines() {
        let err = Manifest::parse("h1 app-1.0-full.nupkg 10\nh2 only-two\n").unwrap_err();
        assert_eq!(
            err,
            MalformedManifestError::MissingFields { line: 2, found: 2 }
        );
    }

    #[test]
    fn parse_rejects_bad_sizes() {
        for bad in ["-5", "ten", "1.5", ""] {
            let text = format!("h1 app.nupkg {bad}");
            let err = Manifest::parse(&text).unwrap_err();
            assert!(
                matches!(err, MalformedManifestError::InvalidSize { line: 1, .. }),
                "size '{bad}' should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn parse_reads_a_filename_with_a_space_as_a_bad_size() {
        let err = Manifest::parse("h1 my app.nupkg 10").unwrap_err();
        assert_eq!(
            err,
            MalformedManifestError::InvalidSize {
                line: 1,
                value: "app.nupkg".to_string()
            }
        );
    }

    #[test]
    fn parse_ignores_fields_past_the_size() {
        let manifest =
            Manifest::parse("h1 app-1.0-full.nupkg 1000 
h2 app-1.0-1.1-delta.nupkg 50 extra
")
                .unwrap();
        assert_eq!(
            manifest.records(),
            [
                ArtifactRecord::new("h1", "app-1.0-full.nupkg", 1000),
                ArtifactRecord::new("h2", "app-1.0-1.1-delta.nupkg", 50),
            ]
        );
        assert_eq!(
            manifest.serialize(),
            "h1 app-1.0-full.nupkg 1000\nh2 app-1.0-1.1-delta.nupkg 50\n"
        );
    }

    #[test]
    fn parse_rejects_duplicate_filenames() {
        let err = Manifest::parse("h1 a.nupkg 1\nh2 a.nupkg 2\n").unwrap_err();
        assert_eq!(
            err,
            MalformedManifestError::DuplicateFilename {
                line: 2,
                filename: "a.nupkg".to_string()
            }
        );
    }

    #[test]
    fn classify_uses_configured_markers() {
        let markers = ArtifactMarkers::default();
        assert_eq!(markers.classify_name("app-1.0-full.nupkg"), ArtifactKind::Full);
        assert_eq!(
            markers.classify_name("app-1.0-1.1-delta.nupkg"),
            ArtifactKind::Delta
        );
        assert_eq!(markers.classify_name("Setup.exe"), ArtifactKind::Other);

        let custom = ArtifactMarkers::new(".base", ".patch");
        assert_eq!(custom.classify_name("app-1.0-full.nupkg"), ArtifactKind::Other);
        assert_eq!(custom.classify_name("app.base.pkg"), ArtifactKind::Full);
        assert_eq!(custom.classify_name("app.patch.pkg"), ArtifactKind::Delta);
    }

    #[test]
    fn latest_full_is_last_in_manifest_order() {
        let manifest = Manifest::parse(SCENARIO_A).unwrap();
        let markers = ArtifactMarkers::default();
        let latest = manifest.latest_full(&markers).unwrap();
        assert_eq!(latest.hash.as_str(), "h4");
        assert_eq!(manifest.of_kind(&markers, ArtifactKind::Delta).count(), 3);
    }

    #[test]
    fn push_refuses_duplicate_filenames() {
        let mut manifest = Manifest::new();
        assert!(manifest.push(ArtifactRecord::new("h1", "a.nupkg", 1)));
        assert!(!manifest.push(ArtifactRecord::new("h2", "a.nupkg", 2)));
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("a.nupkg").unwrap().hash.as_str(), "h1");
    }

    #[test]
    fn remove_filenames_preserves_order() {
        let mut manifest = Manifest::parse(SCENARIO_A).unwrap();
        let doomed = ["app-1.0-full.nupkg".to_string(), "app-1.1-1.2-delta.nupkg".to_string()]
            .into_iter()
            .collect();
        manifest.remove_filenames(&doomed);
        let hashes: Vec<&str> = manifest.iter().map(|r| r.hash.as_str()).collect();
        assert_eq!(hashes, ["h2", "h4", "h5"]);
    }
}
