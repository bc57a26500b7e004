//! Safe archive extraction into request-scoped scratch storage.
//!
//! All ceilings are checked against the central directory before any
//! entry is inflated; inflation itself is bounded again so a lying
//! directory cannot exceed the per-entry limit. Scratch space is a
//! `TempDir` released on every exit path via `Drop`.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::config::ExtractLimits;
use crate::error::{IngestError, IngestResult};

/// Request-scoped extraction area.
pub struct Scratch {
    dir: tempfile::TempDir,
}

impl Scratch {
    pub fn create() -> IngestResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("custodia-ingest-")
            .tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// One extracted archive entry.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Archive-relative name, `/` separators on every platform.
    pub rel_path: String,
    pub disk_path: PathBuf,
    pub size: u64,
}

impl ExtractedFile {
    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }
}

fn malformed(reason: impl Into<String>) -> IngestError {
    IngestError::MalformedArchive {
        reason: reason.into(),
    }
}

fn over_limit(reason: impl Into<String>) -> IngestError {
    IngestError::LimitExceeded {
        reason: reason.into(),
    }
}

/// Normalize and validate an entry name. Separators become `/`; absolute
/// paths, drive prefixes, `.`/`..` components and empty segments are
/// rejected.
fn safe_rel_path(raw: &str, limits: &ExtractLimits) -> IngestResult<String> {
    if raw.len() > limits.max_path_len {
        return Err(over_limit(format!(
            "entry path length {} exceeds limit {}",
            raw.len(),
            limits.max_path_len
        )));
    }

    let normalized = raw.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(malformed(format!("absolute entry path '{raw}'")));
    }
    for component in normalized.split('/') {
        match component {
            "" | "." | ".." => {
                return Err(malformed(format!("unsafe entry path '{raw}'")));
            }
            // A `C:`-style component would re-root the join on Windows.
            c if c.contains(':') => {
                return Err(malformed(format!("unsafe entry path '{raw}'")));
            }
            _ => {}
        }
    }
    Ok(normalized)
}

/// Unpack `bytes` into `scratch`, enforcing [`ExtractLimits`].
///
/// Ceiling violations are detected from the central directory before any
/// entry is written to disk.
pub fn extract_archive(
    bytes: &[u8],
    scratch: &Scratch,
    limits: &ExtractLimits,
) -> IngestResult<Vec<ExtractedFile>> {
    if bytes.len() as u64 > limits.max_archive_bytes {
        return Err(over_limit(format!(
            "archive is {} bytes, limit {}",
            bytes.len(),
            limits.max_archive_bytes
        )));
    }

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| malformed(format!("not a zip: {e}")))?;

    if archive.len() > limits.max_entries {
        return Err(over_limit(format!(
            "{} entries, limit {}",
            archive.len(),
            limits.max_entries
        )));
    }

    // Pass one: validate paths and declared sizes without inflating.
    let mut declared_total: u64 = 0;
    let mut names: Vec<Option<String>> = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| malformed(format!("entry #{i}: {e}")))?;
        if entry.is_dir() {
            names.push(None);
            continue;
        }

        let rel_path = safe_rel_path(entry.name(), limits)?;
        if entry.size() > limits.max_entry_bytes {
            return Err(over_limit(format!(
                "entry '{rel_path}' declares {} bytes, limit {}",
                entry.size(),
                limits.max_entry_bytes
            )));
        }
        declared_total = declared_total.saturating_add(entry.size());
        if declared_total > limits.max_total_bytes {
            return Err(over_limit(format!(
                "archive declares more than {} uncompressed bytes",
                limits.max_total_bytes
            )));
        }
        names.push(Some(rel_path));
    }

    // The reader deduplicates exact names; distinct raw names can still
    // collide after separator normalization.
    let mut seen = std::collections::HashSet::new();
    for rel_path in names.iter().flatten() {
        if !seen.insert(rel_path.as_str()) {
            return Err(malformed(format!("duplicate entry '{rel_path}'")));
        }
    }

    // Pass two: inflate, bounded per entry in case the directory lies.
    let mut files = Vec::new();
    for (i, rel_path) in names.into_iter().enumerate() {
        let Some(rel_path) = rel_path else { continue };
        let mut entry = archive
            .by_index(i)
            .map_err(|e| malformed(format!("entry #{i}: {e}")))?;

        let disk_path = scratch.path().join(&rel_path);
        if let Some(parent) = disk_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = fs::File::create(&disk_path)?;
        let mut bounded = (&mut entry).take(limits.max_entry_bytes + 1);
        let written = std::io::copy(&mut bounded, &mut out)
            .map_err(|e| malformed(format!("inflating '{rel_path}': {e}")))?;
        if written > limits.max_entry_bytes {
            return Err(over_limit(format!(
                "entry '{rel_path}' inflated past the {}-byte limit",
                limits.max_entry_bytes
            )));
        }

        files.push(ExtractedFile {
            rel_path,
            disk_path,
            size: written,
        });
    }

    Ok(files)
}
