//! Bundle dialect detection.
//!
//! The decision is made once, here, and the rest of the pipeline matches
//! on the closed [`DialectKind`] — no scattered field-presence probing.

use crate::bundle::extract::ExtractedFile;
use crate::error::{IngestError, IngestResult};
use crate::types::DialectKind;

/// Root manifest name for Tella bundles.
pub const TELLA_MANIFEST: &str = "manifest.json";
/// Root manifest name for eyeWitness bundles.
pub const EYEWITNESS_MANIFEST: &str = "metadata.yaml";
/// Embedded public key in ProofMode bundles.
pub const PROOFMODE_PUBKEY: &str = "pubkey.asc";

/// Decide the dialect, in priority order:
/// ProofMode when at least two of its markers ({`*.proof.json`, `*.asc`,
/// `pubkey.asc`}) are present anywhere; else Tella on a root
/// `manifest.json`; else eyeWitness on a root `metadata.yaml`.
pub fn detect(files: &[ExtractedFile]) -> IngestResult<DialectKind> {
    let mut has_proof_json = false;
    let mut has_detached_sig = false;
    let mut has_pubkey = false;

    for file in files {
        let name = file.file_name();
        if name.ends_with(".proof.json") {
            has_proof_json = true;
        } else if name == PROOFMODE_PUBKEY {
            has_pubkey = true;
        } else if name.ends_with(".asc") {
            has_detached_sig = true;
        }
    }

    let marker_count =
        usize::from(has_proof_json) + usize::from(has_detached_sig) + usize::from(has_pubkey);
    if marker_count >= 2 {
        return Ok(DialectKind::ProofMode);
    }
    if files.iter().any(|f| f.rel_path == TELLA_MANIFEST) {
        return Ok(DialectKind::Tella);
    }
    if files.iter().any(|f| f.rel_path == EYEWITNESS_MANIFEST) {
        return Ok(DialectKind::EyeWitness);
    }
    Err(IngestError::UnrecognizedFormat)
}
