//! Core data model for the ingestion pipeline.
//!
//! `MediaFile` and `SignatureRecord` are request-scoped: they exist for
//! the lifetime of one ingestion call. `StoredObject` and `LedgerEntry`
//! describe durable, write-once state and are echoed back to the caller
//! in the [`IngestReceipt`].

use crate::store::{ObjectKey, StoredObject};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

/// Bundle packaging convention, decided once by the format detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DialectKind {
    Tella,
    EyeWitness,
    ProofMode,
}

impl DialectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tella => "tella",
            Self::EyeWitness => "eyewitness",
            Self::ProofMode => "proofmode",
        }
    }
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A WGS84 point parsed from a metadata sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl GeoPoint {
    /// Reject coordinates outside the WGS84 domain.
    pub fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
            Some(Self {
                latitude,
                longitude,
                altitude: None,
                accuracy: None,
            })
        } else {
            None
        }
    }
}

/// Best-effort enrichment extracted from a sidecar. Every field is
/// optional; a missing or malformed sidecar leaves all of them empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Device block passed through opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Value>,
    /// Network block passed through opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Value>,
}

impl MediaMetadata {
    pub fn is_empty(&self) -> bool {
        self.captured_at.is_none()
            && self.location.is_none()
            && self.device.is_none()
            && self.network.is_none()
    }
}

/// One media file inside a bundle, after hash verification.
#[derive(Debug, Clone, Serialize)]
pub struct MediaFile {
    /// Archive-relative name with `/` separators.
    pub rel_path: String,
    /// Scratch-extraction path. Valid only for the request's lifetime.
    #[serde(skip)]
    pub disk_path: PathBuf,
    /// Computed sha256, lower-case hex.
    pub sha256: String,
    pub mime: String,
    pub size: u64,
    pub metadata: MediaMetadata,
}

impl MediaFile {
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// Lower-cased original extension including the dot, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.rel_path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(format!(".{}", ext.to_ascii_lowercase()))
        }
    }
}

/// Content type from the file extension, defaulting to octet-stream.
/// Covers the formats field-collection apps actually produce.
pub fn mime_for_name(name: &str) -> String {
    let ext = name
        .rsplit('/')
        .next()
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "tif" | "tiff" => "image/tiff",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "3gp" => "video/3gpp",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "zip" => "application/zip",
        "asc" => "application/pgp-signature",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

/// Signer trust for a verified signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrustLevel {
    /// The signer's fingerprint is in the configured trust list.
    Trusted,
    /// The key came from the bundle itself (`pubkey.asc`).
    Embedded,
    /// No usable key material was found.
    Unknown,
}

/// Outcome of verifying one detached signature.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureRecord {
    pub signature_file: String,
    pub data_file: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub trust: TrustLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A media file together with its durable object.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMedia {
    pub file: MediaFile,
    pub object: StoredObject,
}

/// A stored thumbnail with its back-reference to the original.
#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailArtifact {
    pub object: StoredObject,
    pub original_sha256: String,
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
}

/// Non-fatal note that a thumbnail was not produced for a media file.
#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailSkipped {
    pub file: String,
    pub reason: String,
}

/// Tamper-evident audit payload, assembled only once every stored object
/// has a confirmed version id.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub bundle_sha256: String,
    pub bundle_version_id: String,
    pub media_version_ids: Vec<String>,
    pub thumbnail_version_ids: Vec<String>,
    pub ingested_at: DateTime<Utc>,
    pub correlation_id: Uuid,
}

impl LedgerEntry {
    /// Append-only ledger key for this bundle. Content-derived, so
    /// re-ingestion targets the same key.
    pub fn ledger_key(&self) -> String {
        format!("evidence:{}", self.bundle_sha256)
    }

    /// JSON payload submitted to the ledger collaborator.
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "type": "evidence_ingest",
            "bundle_sha256": self.bundle_sha256,
            "bundle_version_id": self.bundle_version_id,
            "media_version_ids": self.media_version_ids,
            "thumbnail_version_ids": self.thumbnail_version_ids,
            "ingested_at": self.ingested_at.to_rfc3339(),
            "correlation_id": self.correlation_id,
        })
    }
}

/// Everything the excluded persistence/HTTP layers need after a
/// successful, fully committed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub bundle_sha256: String,
    pub correlation_id: Uuid,
    pub dialect: DialectKind,
    pub bundle: StoredObject,
    pub media: Vec<StoredMedia>,
    pub thumbnails: Vec<ThumbnailArtifact>,
    pub skipped_thumbnails: Vec<ThumbnailSkipped>,
    pub signatures: Vec<SignatureRecord>,
    /// True when the pipeline ran under `SignaturePolicy::AcceptUnverified`.
    pub signature_bypass: bool,
    pub ledger_tx_id: String,
    pub entry: LedgerEntry,
}

impl IngestReceipt {
    /// Key of the stored bundle object.
    pub fn bundle_key(&self) -> &ObjectKey {
        &self.bundle.key
    }
}
