pub mod bundle;
pub mod config;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod pipeline;
pub mod store;
pub mod thumbnail;
pub mod types;

// Convenience re-exports
pub use bundle::{detect, extract_archive, verify_signatures, ExtractedFile, Scratch};
pub use config::{
    ExtractLimits, ExtractLimitsOverrides, IngestConfig, RetentionMode, RetentionPolicy,
    SignaturePolicy,
};
pub use error::{
    ErrorClass, IngestError, IngestResult, ValidationIssue, ValidationReport,
};
pub use ledger::{JsonlLedger, Ledger, LedgerError, MemoryLedger};
pub use pipeline::IngestPipeline;
pub use store::{
    EvidenceStore, KeyBuilder, MemoryStore, ObjectKey, ObjectRole, ObjectStoreBackend,
    PutReceipt, PutRequest, Retention, StoreError, StoreSpec, StoredObject,
};
pub use types::{
    DialectKind, GeoPoint, IngestReceipt, LedgerEntry, MediaFile, MediaMetadata, SignatureRecord,
    StoredMedia, ThumbnailArtifact, ThumbnailSkipped, TrustLevel,
};

// Re-export bytes for CLI convenience
pub use bytes::Bytes;
