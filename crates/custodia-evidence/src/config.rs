//! Pipeline configuration.
//!
//! All knobs are explicit construction-time values. In particular the
//! signature-verification bypass is a typed policy that callers must
//! spell out; nothing in this crate consults the process environment.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Resource ceilings applied to an archive before and during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    /// Maximum size of the submitted archive itself.
    pub max_archive_bytes: u64,
    /// Maximum declared (and enforced) size of any single entry.
    pub max_entry_bytes: u64,
    /// Maximum total declared uncompressed size.
    pub max_total_bytes: u64,
    /// Maximum number of entries.
    pub max_entries: usize,
    /// Maximum entry path length.
    pub max_path_len: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_archive_bytes: 512 * 1024 * 1024,
            max_entry_bytes: 256 * 1024 * 1024,
            max_total_bytes: 1024 * 1024 * 1024,
            max_entries: 2048,
            max_path_len: 256,
        }
    }
}

/// Partial overrides for [`ExtractLimits`]. Only `Some` values override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractLimitsOverrides {
    pub max_archive_bytes: Option<u64>,
    pub max_entry_bytes: Option<u64>,
    pub max_total_bytes: Option<u64>,
    pub max_entries: Option<usize>,
    pub max_path_len: Option<usize>,
}

impl ExtractLimits {
    pub fn apply(self, o: ExtractLimitsOverrides) -> Self {
        Self {
            max_archive_bytes: o.max_archive_bytes.unwrap_or(self.max_archive_bytes),
            max_entry_bytes: o.max_entry_bytes.unwrap_or(self.max_entry_bytes),
            max_total_bytes: o.max_total_bytes.unwrap_or(self.max_total_bytes),
            max_entries: o.max_entries.unwrap_or(self.max_entries),
            max_path_len: o.max_path_len.unwrap_or(self.max_path_len),
        }
    }
}

/// WORM retention requested for every stored object.
///
/// Compliance mode blocks deletion and modification until the expiry
/// date for every caller, privileged ones included. This is the
/// pipeline's core forensic guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub mode: RetentionMode,
    /// Retention horizon in days from the moment of ingestion.
    pub horizon_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RetentionMode {
    Compliance,
    Governance,
}

impl RetentionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliance => "COMPLIANCE",
            Self::Governance => "GOVERNANCE",
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            mode: RetentionMode::Compliance,
            // 7 years.
            horizon_days: 7 * 365,
        }
    }
}

impl RetentionPolicy {
    /// Expiry instant for an object ingested at `now`.
    pub fn until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.horizon_days)
    }
}

/// How ProofMode signatures are handled.
///
/// `AcceptUnverified` exists for controlled, non-production use (fixture
/// replay, air-gapped triage). It must be constructed explicitly, it is
/// recorded in every receipt, and it still rejects structural problems
/// such as orphan signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignaturePolicy {
    Enforce,
    AcceptUnverified { reason: String },
}

impl SignaturePolicy {
    pub fn is_bypass(&self) -> bool {
        matches!(self, Self::AcceptUnverified { .. })
    }
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        Self::Enforce
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    pub limits: ExtractLimits,
    pub retention: RetentionPolicy,
    pub signatures: SignaturePolicy,
    /// Hex fingerprints of externally trusted signers (upper/lower case
    /// accepted). Keys found in a bundle are otherwise only `Embedded`.
    pub trusted_fingerprints: Vec<String>,
}

impl IngestConfig {
    pub fn is_trusted_fingerprint(&self, fingerprint: &str) -> bool {
        self.trusted_fingerprints
            .iter()
            .any(|f| f.eq_ignore_ascii_case(fingerprint))
    }
}
