//! Evidence bundle handling: extraction, dialect detection, manifest
//! validation, signature verification, and sidecar metadata.

pub mod detect;
pub mod extract;
pub mod manifest;
pub mod metadata;
pub mod signature;

pub use detect::detect;
pub use extract::{extract_archive, ExtractedFile, Scratch};
pub use manifest::ManifestEntry;
pub use signature::verify_signatures;
