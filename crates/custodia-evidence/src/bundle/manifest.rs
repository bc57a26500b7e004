//! Manifest parsing and validation for Tella and eyeWitness bundles.
//!
//! Both dialects declare `{path, sha256}` pairs; Tella as JSON
//! (`manifest.json`, key `filename`), eyeWitness as YAML
//! (`metadata.yaml`, key `file_name`). They normalize into one
//! [`ManifestEntry`] list and share a single validator.
//!
//! Validation never short-circuits: every missing file, hash mismatch
//! and undeclared file for a bundle lands in one report.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::bundle::extract::ExtractedFile;
use crate::error::{IngestError, IngestResult, ValidationIssue, ValidationReport};
use crate::hash::{is_hex_digest, sha256_file};
use crate::types::{mime_for_name, MediaFile, MediaMetadata};

/// Uniform declared entry: relative path plus expected sha256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub expected_sha256: String,
}

#[derive(Debug, Deserialize)]
struct TellaManifest {
    files: Vec<TellaFile>,
}

#[derive(Debug, Deserialize)]
struct TellaFile {
    filename: String,
    sha256: String,
}

#[derive(Debug, Deserialize)]
struct EyeWitnessManifest {
    files: Vec<EyeWitnessFile>,
}

#[derive(Debug, Deserialize)]
struct EyeWitnessFile {
    file_name: String,
    sha256: String,
}

fn parse_error(reason: impl std::fmt::Display) -> IngestError {
    IngestError::ManifestParse {
        reason: reason.to_string(),
    }
}

/// Parse a Tella `manifest.json` into uniform entries.
pub fn parse_tella(path: &Path) -> IngestResult<Vec<ManifestEntry>> {
    let content = std::fs::read_to_string(path)?;
    let manifest: TellaManifest = serde_json::from_str(&content).map_err(parse_error)?;
    Ok(manifest
        .files
        .into_iter()
        .map(|f| ManifestEntry {
            path: f.filename,
            expected_sha256: f.sha256,
        })
        .collect())
}

/// Parse an eyeWitness `metadata.yaml` into uniform entries.
pub fn parse_eyewitness(path: &Path) -> IngestResult<Vec<ManifestEntry>> {
    let content = std::fs::read_to_string(path)?;
    let manifest: EyeWitnessManifest = serde_yaml::from_str(&content).map_err(parse_error)?;
    Ok(manifest
        .files
        .into_iter()
        .map(|f| ManifestEntry {
            path: f.file_name,
            expected_sha256: f.sha256,
        })
        .collect())
}

fn normalize_declared(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized
}

/// Cross-check declared entries against the extracted file set.
///
/// `manifest_rel` is excluded from the actual set. Success requires
/// file-set equality and a 100% hash match; any issue rejects the whole
/// bundle with the complete report.
pub fn validate(
    entries: &[ManifestEntry],
    files: &[ExtractedFile],
    manifest_rel: &str,
) -> IngestResult<Result<Vec<MediaFile>, ValidationReport>> {
    let actual: BTreeMap<&str, &ExtractedFile> = files
        .iter()
        .filter(|f| f.rel_path != manifest_rel)
        .map(|f| (f.rel_path.as_str(), f))
        .collect();

    let mut report = ValidationReport::default();
    let mut declared = BTreeMap::new();
    let mut verified = Vec::new();

    for entry in entries {
        let path = normalize_declared(&entry.path);

        if declared.insert(path.clone(), &entry.expected_sha256).is_some() {
            report.push(ValidationIssue::ManifestEntryInvalid {
                path,
                reason: "declared more than once".into(),
            });
            continue;
        }
        if !is_hex_digest(&entry.expected_sha256) {
            report.push(ValidationIssue::ManifestEntryInvalid {
                path,
                reason: format!("'{}' is not a sha256 hex digest", entry.expected_sha256),
            });
            continue;
        }

        let Some(file) = actual.get(path.as_str()) else {
            report.push(ValidationIssue::MissingFile { path });
            continue;
        };

        let computed = sha256_file(&file.disk_path)?;
        if !computed.eq_ignore_ascii_case(&entry.expected_sha256) {
            report.push(ValidationIssue::HashMismatch {
                path,
                expected: entry.expected_sha256.to_ascii_lowercase(),
                actual: computed,
            });
            continue;
        }

        verified.push(MediaFile {
            rel_path: file.rel_path.clone(),
            disk_path: file.disk_path.clone(),
            sha256: computed,
            mime: mime_for_name(&file.rel_path),
            size: file.size,
            metadata: MediaMetadata::default(),
        });
    }

    for path in actual.keys() {
        if !declared.contains_key(*path) {
            report.push(ValidationIssue::UndeclaredFile {
                path: (*path).to_string(),
            });
        }
    }

    if report.is_empty() {
        Ok(Ok(verified))
    } else {
        Ok(Err(report))
    }
}
