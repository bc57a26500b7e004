//! Ingestion error taxonomy.
//!
//! Integrity-class failures are accumulated into one [`ValidationReport`]
//! and reported in full, never truncated, so a submitter can fix
//! everything in one pass. Storage and ledger failures are fatal to the
//! bundle and are never masked as partial success.

use crate::ledger::LedgerError;
use crate::store::StoreError;
use serde::Serialize;

/// Coarse classification of an ingestion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Archive or dialect could not be understood.
    Format,
    /// Content failed integrity or signature verification.
    Integrity,
    /// A resource ceiling was exceeded before or during extraction.
    Limits,
    /// The object store collaborator failed.
    Storage,
    /// The ledger collaborator failed.
    Ledger,
    /// Unexpected local I/O failure.
    Internal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One finding from manifest or signature validation.
///
/// Checks never short-circuit: every issue for a bundle is collected
/// before the bundle is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code")]
pub enum ValidationIssue {
    /// A manifest entry names a file that is not in the archive.
    MissingFile { path: String },
    /// Computed sha256 differs from the declared value.
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    /// A file is present in the archive but not declared in the manifest.
    UndeclaredFile { path: String },
    /// A manifest entry is syntactically unusable (e.g. non-hex digest).
    ManifestEntryInvalid { path: String, reason: String },
    /// A detached signature has no corresponding data file.
    OrphanSignature { signature_file: String },
    /// A detached signature failed cryptographic verification.
    SignatureInvalid {
        signature_file: String,
        reason: String,
    },
}

impl ValidationIssue {
    /// Stable code string, part of the reporting contract.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFile { .. } => "MissingFile",
            Self::HashMismatch { .. } => "HashMismatch",
            Self::UndeclaredFile { .. } => "UndeclaredFile",
            Self::ManifestEntryInvalid { .. } => "ManifestParseError",
            Self::OrphanSignature { .. } => "OrphanSignature",
            Self::SignatureInvalid { .. } => "SignatureInvalid",
        }
    }

    /// The archive path this issue is about.
    pub fn path(&self) -> &str {
        match self {
            Self::MissingFile { path }
            | Self::HashMismatch { path, .. }
            | Self::UndeclaredFile { path }
            | Self::ManifestEntryInvalid { path, .. } => path,
            Self::OrphanSignature { signature_file }
            | Self::SignatureInvalid { signature_file, .. } => signature_file,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFile { path } => write!(f, "missing file: {path}"),
            Self::HashMismatch {
                path,
                expected,
                actual,
            } => write!(f, "hash mismatch for {path}: declared {expected}, computed {actual}"),
            Self::UndeclaredFile { path } => write!(f, "undeclared file: {path}"),
            Self::ManifestEntryInvalid { path, reason } => {
                write!(f, "unusable manifest entry for {path}: {reason}")
            }
            Self::OrphanSignature { signature_file } => {
                write!(f, "orphan signature: {signature_file} has no data file")
            }
            Self::SignatureInvalid {
                signature_file,
                reason,
            } => write!(f, "invalid signature {signature_file}: {reason}"),
        }
    }
}

/// Full, non-truncated validation outcome for one bundle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Issues with the given stable code.
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues.iter().filter(move |i| i.code() == code)
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}

/// Fatal ingestion error. One bundle, one outcome.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The archive could not be opened or contains unsafe entries.
    #[error("malformed archive: {reason}")]
    MalformedArchive { reason: String },

    /// The archive exceeds a configured ceiling (checked before extraction).
    #[error("archive exceeds limit: {reason}")]
    LimitExceeded { reason: String },

    /// No dialect markers matched. The bundle is not Tella, eyeWitness or
    /// ProofMode.
    #[error("unrecognized bundle format")]
    UnrecognizedFormat,

    /// The dialect manifest exists but could not be parsed.
    #[error("manifest parse error: {reason}")]
    ManifestParse { reason: String },

    /// Integrity or signature validation failed; the report carries every
    /// finding.
    #[error("bundle rejected: {report}")]
    BundleRejected { report: ValidationReport },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedArchive { .. } | Self::UnrecognizedFormat | Self::ManifestParse { .. } => {
                ErrorClass::Format
            }
            Self::LimitExceeded { .. } => ErrorClass::Limits,
            Self::BundleRejected { .. } => ErrorClass::Integrity,
            Self::Store(_) => ErrorClass::Storage,
            Self::Ledger(_) => ErrorClass::Ledger,
            Self::Io(_) => ErrorClass::Internal,
        }
    }

    /// HTTP status for the (externally owned) upload boundary.
    ///
    /// 400 for everything the submitter can fix, 415 for content we do not
    /// speak, 500 for collaborator unavailability.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnrecognizedFormat => 415,
            Self::MalformedArchive { .. }
            | Self::LimitExceeded { .. }
            | Self::ManifestParse { .. }
            | Self::BundleRejected { .. } => 400,
            Self::Store(_) | Self::Ledger(_) | Self::Io(_) => 500,
        }
    }
}

/// Result alias used throughout the pipeline.
pub type IngestResult<T> = Result<T, IngestError>;
