//! Detached OpenPGP signature verification for ProofMode bundles.
//!
//! Every `*.asc` entry is a detached signature whose data file is the
//! same path minus the suffix. Key material is the bundle's embedded
//! `pubkey.asc`; a signer whose fingerprint appears in the configured
//! trust list is reported as `Trusted`, otherwise `Embedded`.
//!
//! Acceptance requires every signature to verify. Failures are
//! accumulated, never truncated. The `AcceptUnverified` policy skips the
//! cryptography (and says so in each record) but still rejects
//! structural problems such as orphan signatures.

use std::io::Cursor;

use pgp::composed::{Deserializable, SignedPublicKey, StandaloneSignature};
use pgp::types::PublicKeyTrait;

use crate::bundle::detect::PROOFMODE_PUBKEY;
use crate::bundle::extract::ExtractedFile;
use crate::config::{IngestConfig, SignaturePolicy};
use crate::error::{IngestResult, ValidationIssue, ValidationReport};
use crate::types::{SignatureRecord, TrustLevel};

struct EmbeddedKey {
    key: SignedPublicKey,
    fingerprint: String,
}

fn fingerprint_hex(key: &impl PublicKeyTrait) -> String {
    hex::encode(key.fingerprint().as_bytes())
}

/// Load and self-check the bundle's `pubkey.asc`.
///
/// `Ok(None)` when absent; `Err(reason)` when present but unusable.
fn load_embedded_key(files: &[ExtractedFile]) -> IngestResult<Result<Option<EmbeddedKey>, String>> {
    let Some(pubkey_file) = files.iter().find(|f| f.file_name() == PROOFMODE_PUBKEY) else {
        return Ok(Ok(None));
    };

    let bytes = std::fs::read(&pubkey_file.disk_path)?;
    let parsed = match SignedPublicKey::from_armor_single(Cursor::new(bytes)) {
        Ok((key, _headers)) => key,
        Err(e) => return Ok(Err(format!("pubkey.asc is not an armored public key: {e}"))),
    };
    if let Err(e) = parsed.verify() {
        return Ok(Err(format!("pubkey.asc self-signature check failed: {e}")));
    }

    let fingerprint = fingerprint_hex(&parsed);
    Ok(Ok(Some(EmbeddedKey {
        key: parsed,
        fingerprint,
    })))
}

fn verify_one(key: &SignedPublicKey, signature_bytes: &[u8], data: &[u8]) -> Result<(), String> {
    let signature = match StandaloneSignature::from_armor_single(Cursor::new(signature_bytes)) {
        Ok((sig, _headers)) => sig,
        Err(e) => return Err(format!("not an armored detached signature: {e}")),
    };

    if signature.verify(key, data).is_ok() {
        return Ok(());
    }
    for subkey in &key.public_subkeys {
        if signature.verify(subkey, data).is_ok() {
            return Ok(());
        }
    }
    Err("signature does not verify against the bundle key".to_string())
}

/// Verify all detached signatures in a ProofMode bundle.
///
/// Returns the complete record list plus the accumulated issues. An
/// empty report means the bundle's signatures are acceptable under the
/// configured policy.
pub fn verify_signatures(
    files: &[ExtractedFile],
    config: &IngestConfig,
) -> IngestResult<(Vec<SignatureRecord>, ValidationReport)> {
    let mut records = Vec::new();
    let mut report = ValidationReport::default();

    let bypass = config.signatures.is_bypass();
    if let SignaturePolicy::AcceptUnverified { reason } = &config.signatures {
        tracing::warn!(reason, "signature verification bypass is active");
    }

    let embedded = if bypass {
        Ok(None)
    } else {
        load_embedded_key(files)?
    };

    for sig_file in files.iter().filter(|f| {
        f.file_name().ends_with(".asc") && f.file_name() != PROOFMODE_PUBKEY
    }) {
        let data_rel = sig_file
            .rel_path
            .strip_suffix(".asc")
            .unwrap_or(&sig_file.rel_path)
            .to_string();

        let Some(data_file) = files.iter().find(|f| f.rel_path == data_rel) else {
            report.push(ValidationIssue::OrphanSignature {
                signature_file: sig_file.rel_path.clone(),
            });
            records.push(SignatureRecord {
                signature_file: sig_file.rel_path.clone(),
                data_file: data_rel,
                valid: false,
                fingerprint: None,
                trust: TrustLevel::Unknown,
                error: Some("data file not present".to_string()),
            });
            continue;
        };

        if bypass {
            records.push(SignatureRecord {
                signature_file: sig_file.rel_path.clone(),
                data_file: data_file.rel_path.clone(),
                valid: false,
                fingerprint: None,
                trust: TrustLevel::Unknown,
                error: Some("verification bypassed".to_string()),
            });
            continue;
        }

        let (valid, fingerprint, trust, error) = match &embedded {
            Ok(Some(embedded_key)) => {
                let signature_bytes = std::fs::read(&sig_file.disk_path)?;
                let data = std::fs::read(&data_file.disk_path)?;
                match verify_one(&embedded_key.key, &signature_bytes, &data) {
                    Ok(()) => {
                        let trust = if config.is_trusted_fingerprint(&embedded_key.fingerprint) {
                            TrustLevel::Trusted
                        } else {
                            TrustLevel::Embedded
                        };
                        (true, Some(embedded_key.fingerprint.clone()), trust, None)
                    }
                    Err(reason) => (
                        false,
                        Some(embedded_key.fingerprint.clone()),
                        TrustLevel::Unknown,
                        Some(reason),
                    ),
                }
            }
            Ok(None) => (
                false,
                None,
                TrustLevel::Unknown,
                Some("no key material in bundle".to_string()),
            ),
            Err(key_error) => (false, None, TrustLevel::Unknown, Some(key_error.clone())),
        };

        if !valid {
            report.push(ValidationIssue::SignatureInvalid {
                signature_file: sig_file.rel_path.clone(),
                reason: error.clone().unwrap_or_default(),
            });
        }
        records.push(SignatureRecord {
            signature_file: sig_file.rel_path.clone(),
            data_file: data_file.rel_path.clone(),
            valid,
            fingerprint,
            trust,
            error,
        });
    }

    Ok((records, report))
}
