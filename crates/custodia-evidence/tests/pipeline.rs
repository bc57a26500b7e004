//! End-to-end pipeline tests over the in-memory store and ledger.

use std::io::{Cursor, Write};
use std::sync::Arc;

use bytes::Bytes;
use pgp::composed::{KeyType, SecretKeyParamsBuilder, SignedSecretKey, StandaloneSignature};
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::public_key::PublicKeyAlgorithm;
use pgp::packet::{SignatureConfig, SignatureType, Subpacket, SubpacketData};
use pgp::types::{PublicKeyTrait, SecretKeyTrait};
use serde_json::json;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use custodia_evidence::hash::sha256_hex;
use custodia_evidence::store::ObjectRole;
use custodia_evidence::{
    DialectKind, IngestConfig, IngestError, IngestPipeline, Ledger, MemoryLedger, MemoryStore,
    ObjectKey, SignaturePolicy, TrustLevel,
};

fn build_zip(files: &[(&str, &[u8])]) -> Bytes {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, bytes) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    Bytes::from(writer.finish().unwrap().into_inner())
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(32, 16, |x, y| image::Rgb([x as u8, y as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn tella_manifest(files: &[(&str, &[u8])]) -> Vec<u8> {
    let declared: Vec<_> = files
        .iter()
        .map(|(name, bytes)| json!({ "filename": name, "sha256": sha256_hex(bytes) }))
        .collect();
    serde_json::to_vec(&json!({ "files": declared })).unwrap()
}

fn pipeline(config: IngestConfig) -> (Arc<MemoryStore>, Arc<MemoryLedger>, IngestPipeline) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MemoryLedger::new());
    let pipeline = IngestPipeline::new(store.clone(), ledger.clone(), config);
    (store, ledger, pipeline)
}

fn valid_tella_bundle() -> (Bytes, Vec<u8>) {
    let png = png_bytes();
    let media: Vec<(&str, &[u8])> = vec![("photo.png", png.as_slice()), ("notes.txt", b"context")];
    let manifest = tella_manifest(&media);
    let mut entries = media;
    entries.insert(0, ("manifest.json", manifest.as_slice()));
    (build_zip(&entries), png)
}

fn proofmode_signer() -> (SignedSecretKey, String) {
    let mut rng = rand::thread_rng();
    let params = SecretKeyParamsBuilder::default()
        .key_type(KeyType::EdDSALegacy)
        .can_certify(true)
        .can_sign(true)
        .primary_user_id("Field Unit <field-unit@example.org>".into())
        .passphrase(None)
        .build()
        .unwrap();
    let secret = params
        .generate(&mut rng)
        .unwrap()
        .sign(&mut rng, String::new)
        .unwrap();
    let public = secret
        .public_key()
        .sign(&mut rng, &secret, String::new)
        .unwrap();
    let armored = public.to_armored_string(None.into()).unwrap();
    (secret, armored)
}

fn detached_signature(signer: &SignedSecretKey, data: &[u8]) -> String {
    let mut config = SignatureConfig::v4(
        SignatureType::Binary,
        PublicKeyAlgorithm::EdDSALegacy,
        HashAlgorithm::SHA2_256,
    );
    config.hashed_subpackets = vec![
        Subpacket::regular(SubpacketData::SignatureCreationTime(chrono::Utc::now())),
        Subpacket::regular(SubpacketData::Issuer(signer.key_id())),
    ];
    let signature = config.sign(signer, String::new, data).unwrap();
    StandaloneSignature::new(signature)
        .to_armored_string(None.into())
        .unwrap()
}

#[tokio::test]
async fn valid_tella_bundle_commits_everything() {
    let (store, ledger, pipeline) = pipeline(IngestConfig::default());
    let (bundle, png) = valid_tella_bundle();
    let bundle_sha = sha256_hex(&bundle);

    let receipt = pipeline.ingest(bundle.clone()).await.unwrap();

    assert_eq!(receipt.dialect, DialectKind::Tella);
    assert_eq!(receipt.bundle_sha256, bundle_sha);
    assert_eq!(receipt.bundle.key.relative(), format!("bundle/{bundle_sha}.zip"));
    assert!(store.contains(&ObjectKey::bundle(&bundle_sha)));

    // both declared media stored under their own hashes
    assert_eq!(receipt.media.len(), 2);
    let photo = receipt
        .media
        .iter()
        .find(|m| m.file.rel_path == "photo.png")
        .unwrap();
    assert_eq!(photo.file.sha256, sha256_hex(&png));
    assert_eq!(photo.object.key.relative(), format!("media/{}.png", photo.file.sha256));
    assert_eq!(
        store.content_type_of(&photo.object.key).as_deref(),
        Some("image/png")
    );

    // one thumbnail, keyed by its own hash, with back-references
    assert_eq!(receipt.thumbnails.len(), 1);
    assert!(receipt.skipped_thumbnails.is_empty());
    let thumb = &receipt.thumbnails[0];
    assert_eq!(thumb.original_sha256, photo.file.sha256);
    assert_eq!((thumb.original_width, thumb.original_height), (32, 16));
    let meta = store.metadata_of(&thumb.object.key).unwrap();
    assert_eq!(meta.get("original_sha256"), Some(&photo.file.sha256));
    assert_eq!(meta.get("original_width"), Some(&"32".to_string()));

    // ledger record written last, under the content-derived key
    assert_eq!(ledger.record_count(), 1);
    let payload = ledger
        .read(&format!("evidence:{bundle_sha}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload["type"], "evidence_ingest");
    assert_eq!(payload["bundle_version_id"], receipt.bundle.version_id.as_str());
    assert_eq!(payload["media_version_ids"].as_array().unwrap().len(), 2);
    assert!(!receipt.signature_bypass);
}

#[tokio::test]
async fn validation_failures_accumulate_and_store_nothing() {
    let (store, ledger, pipeline) = pipeline(IngestConfig::default());

    // declared-but-absent file, wrong hash, and an undeclared extra
    let manifest = serde_json::to_vec(&json!({ "files": [
        { "filename": "gone.jpg", "sha256": sha256_hex(b"x") },
        { "filename": "notes.txt", "sha256": sha256_hex(b"other content") },
    ]}))
    .unwrap();
    let bundle = build_zip(&[
        ("manifest.json", manifest.as_slice()),
        ("notes.txt", b"context"),
        ("extra.bin", b"surprise"),
    ]);

    let err = pipeline.ingest(bundle).await.unwrap_err();
    let IngestError::BundleRejected { report } = &err else {
        panic!("expected rejection, got {err:?}");
    };
    assert_eq!(report.len(), 3);
    assert_eq!(report.with_code("MissingFile").count(), 1);
    assert_eq!(report.with_code("HashMismatch").count(), 1);
    assert_eq!(report.with_code("UndeclaredFile").count(), 1);
    assert_eq!(err.http_status(), 400);

    assert_eq!(store.object_count(), 0);
    assert_eq!(ledger.record_count(), 0);
}

#[tokio::test]
async fn re_ingest_converges_on_the_same_objects() {
    let (store, ledger, pipeline) = pipeline(IngestConfig::default());
    let (bundle, _) = valid_tella_bundle();

    let first = pipeline.ingest(bundle.clone()).await.unwrap();
    let objects_after_first = store.object_count();
    let second = pipeline.ingest(bundle).await.unwrap();

    // identical keys and version ids, no new objects
    assert_eq!(store.object_count(), objects_after_first);
    assert_eq!(first.bundle.key.relative(), second.bundle.key.relative());
    assert_eq!(first.bundle.version_id, second.bundle.version_id);
    assert_eq!(
        first.entry.media_version_ids.iter().collect::<std::collections::BTreeSet<_>>(),
        second.entry.media_version_ids.iter().collect::<std::collections::BTreeSet<_>>()
    );

    // the ledger is append-only: a second record under the same key
    assert_eq!(ledger.record_count(), 2);
    assert_ne!(first.correlation_id, second.correlation_id);
}

#[tokio::test]
async fn eyewitness_yaml_manifest_is_accepted() {
    let (_store, _ledger, pipeline) = pipeline(IngestConfig::default());
    let yaml = format!(
        "files:\n  - file_name: clip.mp4\n    sha256: {}\n",
        sha256_hex(b"frames")
    );
    let bundle = build_zip(&[("metadata.yaml", yaml.as_bytes()), ("clip.mp4", b"frames")]);

    let receipt = pipeline.ingest(bundle).await.unwrap();
    assert_eq!(receipt.dialect, DialectKind::EyeWitness);
    assert_eq!(receipt.media.len(), 1);
    assert_eq!(receipt.media[0].file.mime, "video/mp4");
    assert!(receipt.thumbnails.is_empty());
}

#[tokio::test]
async fn unrecognized_bundle_is_a_415() {
    let (_store, _ledger, pipeline) = pipeline(IngestConfig::default());
    let bundle = build_zip(&[("whatever.bin", b"bytes")]);

    let err = pipeline.ingest(bundle).await.unwrap_err();
    assert!(matches!(err, IngestError::UnrecognizedFormat));
    assert_eq!(err.http_status(), 415);
}

#[tokio::test]
async fn proofmode_without_key_material_is_rejected() {
    let (_store, ledger, pipeline) = pipeline(IngestConfig::default());
    let bundle = build_zip(&[
        ("clip.mp4", b"frames"),
        ("clip.mp4.proof.json", b"{}"),
        ("clip.mp4.asc", b"-----BEGIN PGP SIGNATURE-----\nnope\n-----END PGP SIGNATURE-----\n"),
    ]);

    let err = pipeline.ingest(bundle).await.unwrap_err();
    let IngestError::BundleRejected { report } = err else {
        panic!("expected rejection");
    };
    assert_eq!(report.with_code("SignatureInvalid").count(), 1);
    assert_eq!(ledger.record_count(), 0);
}

#[tokio::test]
async fn proofmode_bypass_accepts_but_records_the_bypass() {
    let config = IngestConfig {
        signatures: SignaturePolicy::AcceptUnverified {
            reason: "fixture replay".into(),
        },
        ..Default::default()
    };
    let (_store, ledger, pipeline) = pipeline(config);
    let sidecar = json!({
        "Proof Generated": "2024-05-01T12:30:00Z",
        "Location.Latitude": 48.8584,
        "Location.Longitude": 2.2945,
    });
    let bundle = build_zip(&[
        ("clip.mp4", b"frames"),
        ("clip.mp4.proof.json", sidecar.to_string().as_bytes()),
        ("clip.mp4.asc", b"sig"),
        ("pubkey.asc", b"key"),
    ]);

    let receipt = pipeline.ingest(bundle).await.unwrap();
    assert_eq!(receipt.dialect, DialectKind::ProofMode);
    assert!(receipt.signature_bypass);
    assert_eq!(receipt.signatures.len(), 1);
    assert!(!receipt.signatures[0].valid);
    assert_eq!(receipt.signatures[0].trust, TrustLevel::Unknown);
    assert_eq!(
        receipt.signatures[0].error.as_deref(),
        Some("verification bypassed")
    );

    // proof material is not media; sidecar metadata still lands
    assert_eq!(receipt.media.len(), 1);
    let clip = &receipt.media[0];
    assert_eq!(clip.file.rel_path, "clip.mp4");
    let location = clip.file.metadata.location.as_ref().unwrap();
    assert!((location.latitude - 48.8584).abs() < 1e-9);
    assert_eq!(ledger.record_count(), 1);
}

#[tokio::test]
async fn proofmode_signed_bundle_verifies_end_to_end() {
    let (store, ledger, pipeline) = pipeline(IngestConfig::default());
    let (signer, pubkey_armor) = proofmode_signer();
    let png = png_bytes();
    let signature = detached_signature(&signer, &png);
    let sidecar = json!({
        "Proof Generated": "2024-05-01T12:30:00Z",
        "Location.Latitude": 48.8584,
        "Location.Longitude": 2.2945,
    });
    let bundle = build_zip(&[
        ("photo.png", png.as_slice()),
        ("photo.png.asc", signature.as_bytes()),
        ("photo.json", sidecar.to_string().as_bytes()),
        ("pubkey.asc", pubkey_armor.as_bytes()),
    ]);

    let receipt = pipeline.ingest(bundle).await.unwrap();
    assert_eq!(receipt.dialect, DialectKind::ProofMode);
    assert!(!receipt.signature_bypass);
    assert_eq!(receipt.signatures.len(), 1);
    let record = &receipt.signatures[0];
    assert!(record.valid);
    assert_eq!(record.trust, TrustLevel::Embedded);
    assert!(record.error.is_none());
    assert!(record.fingerprint.is_some());

    // proof material stays out of the media set; the signed photo keeps
    // its sidecar metadata and gets a thumbnail
    assert_eq!(receipt.media.len(), 1);
    let photo = &receipt.media[0];
    assert_eq!(photo.file.rel_path, "photo.png");
    let location = photo.file.metadata.location.as_ref().unwrap();
    assert!((location.longitude - 2.2945).abs() < 1e-9);
    assert_eq!(receipt.thumbnails.len(), 1);
    assert_eq!(receipt.thumbnails[0].original_sha256, photo.file.sha256);

    assert!(store.contains(&receipt.bundle.key));
    assert_eq!(ledger.record_count(), 1);
}

#[tokio::test]
async fn bypass_still_rejects_orphan_signatures() {
    let config = IngestConfig {
        signatures: SignaturePolicy::AcceptUnverified {
            reason: "fixture replay".into(),
        },
        ..Default::default()
    };
    let (_store, _ledger, pipeline) = pipeline(config);
    let bundle = build_zip(&[
        ("clip.mp4", b"frames"),
        ("lost.jpg.asc", b"sig"),
        ("pubkey.asc", b"key"),
    ]);

    let err = pipeline.ingest(bundle).await.unwrap_err();
    let IngestError::BundleRejected { report } = err else {
        panic!("expected rejection");
    };
    assert_eq!(report.with_code("OrphanSignature").count(), 1);
}

#[tokio::test]
async fn corrupt_image_skips_the_thumbnail_only() {
    let (store, ledger, pipeline) = pipeline(IngestConfig::default());
    let fake_jpeg: &[u8] = b"not actually pixels";
    let media: Vec<(&str, &[u8])> = vec![("broken.jpg", fake_jpeg)];
    let manifest = tella_manifest(&media);
    let bundle = build_zip(&[
        ("manifest.json", manifest.as_slice()),
        ("broken.jpg", fake_jpeg),
    ]);

    let receipt = pipeline.ingest(bundle).await.unwrap();
    assert!(receipt.thumbnails.is_empty());
    assert_eq!(receipt.skipped_thumbnails.len(), 1);
    assert_eq!(receipt.skipped_thumbnails[0].file, "broken.jpg");
    assert!(receipt.skipped_thumbnails[0].reason.starts_with("decode:"));

    // the media object itself is still committed and anchored
    assert!(store.contains(&ObjectKey::media(sha256_hex(fake_jpeg), Some(".jpg".into()))));
    assert_eq!(ledger.record_count(), 1);
}

#[tokio::test]
async fn media_put_failure_writes_no_ledger_record() {
    let (store, ledger, pipeline) = pipeline(IngestConfig::default());
    store.fail_puts_for(ObjectRole::Media);
    let (bundle, _) = valid_tella_bundle();

    let err = pipeline.ingest(bundle).await.unwrap_err();
    assert!(matches!(err, IngestError::Store(_)));
    assert_eq!(err.http_status(), 500);
    assert_eq!(ledger.record_count(), 0);
}

#[tokio::test]
async fn ledger_failure_surfaces_after_storage() {
    let (store, ledger, pipeline) = pipeline(IngestConfig::default());
    ledger.fail_appends();
    let (bundle, _) = valid_tella_bundle();

    let err = pipeline.ingest(bundle).await.unwrap_err();
    assert!(matches!(err, IngestError::Ledger(_)));
    // objects are durable; an identical retry converges onto them
    assert!(store.object_count() > 0);
    assert_eq!(ledger.record_count(), 0);
}

#[tokio::test]
async fn oversized_archive_is_refused_before_extraction() {
    let config = IngestConfig {
        limits: custodia_evidence::ExtractLimits {
            max_archive_bytes: 64,
            ..Default::default()
        },
        ..Default::default()
    };
    let (store, _ledger, pipeline) = pipeline(config);
    let (bundle, _) = valid_tella_bundle();

    let err = pipeline.ingest(bundle).await.unwrap_err();
    assert!(matches!(err, IngestError::LimitExceeded { .. }));
    assert_eq!(store.object_count(), 0);
}

#[tokio::test]
async fn retention_is_applied_to_every_object() {
    let (store, _ledger, pipeline) = pipeline(IngestConfig::default());
    let (bundle, _) = valid_tella_bundle();

    let receipt = pipeline.ingest(bundle).await.unwrap();
    let horizon = chrono::Utc::now() + chrono::Duration::days(7 * 365 - 1);
    for key in std::iter::once(&receipt.bundle.key)
        .chain(receipt.media.iter().map(|m| &m.object.key))
        .chain(receipt.thumbnails.iter().map(|t| &t.object.key))
    {
        let until = store.retention_of(key).unwrap();
        assert!(until > horizon, "retention too short for {key}");
    }
}
