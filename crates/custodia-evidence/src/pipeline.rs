//! The ingestion pipeline.
//!
//! One call takes raw archive bytes through extraction, dialect
//! detection, validation, metadata enrichment, durable storage and the
//! ledger record. Commits are all-or-nothing: the ledger entry is only
//! written after every object put has a confirmed version id, and any
//! failure before that leaves at most orphan content-addressed objects
//! that an identical retry converges onto.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::future::try_join_all;
use tracing::Instrument;
use uuid::Uuid;

use crate::bundle::detect::{EYEWITNESS_MANIFEST, TELLA_MANIFEST};
use crate::bundle::{detect, extract_archive, manifest, metadata, verify_signatures};
use crate::bundle::{ExtractedFile, Scratch};
use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::hash::{sha256_file, sha256_hex};
use crate::ledger::Ledger;
use crate::store::{EvidenceStore, ObjectKey, PutRequest, Retention, StoredObject};
use crate::thumbnail;
use crate::types::{
    mime_for_name, DialectKind, IngestReceipt, LedgerEntry, MediaFile, MediaMetadata,
    SignatureRecord, StoredMedia, ThumbnailArtifact, ThumbnailSkipped,
};

/// The verification and ingestion pipeline, with its two durable
/// collaborators injected at construction.
pub struct IngestPipeline {
    store: Arc<dyn EvidenceStore>,
    ledger: Arc<dyn Ledger>,
    config: IngestConfig,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn EvidenceStore>,
        ledger: Arc<dyn Ledger>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one submitted archive end to end.
    pub async fn ingest(&self, bytes: Bytes) -> IngestResult<IngestReceipt> {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest", correlation_id = %correlation_id);
        self.ingest_inner(bytes, correlation_id).instrument(span).await
    }

    async fn ingest_inner(
        &self,
        bytes: Bytes,
        correlation_id: Uuid,
    ) -> IngestResult<IngestReceipt> {
        let bundle_sha256 = sha256_hex(&bytes);
        tracing::info!(%bundle_sha256, size = bytes.len(), "ingestion started");

        let scratch = Scratch::create()?;
        let files = extract_archive(&bytes, &scratch, &self.config.limits)?;
        let dialect = detect(&files)?;
        tracing::info!(dialect = %dialect, entries = files.len(), "bundle recognized");

        let (mut media, signatures) = self.validate(dialect, &files)?;
        for file in &mut media {
            file.metadata = metadata::metadata_for(&file.rel_path, &files);
        }

        let now = Utc::now();
        let retention = Retention {
            mode: self.config.retention.mode,
            until: self.config.retention.until(now),
        };

        let bundle = self.put_bundle(&bundle_sha256, bytes.clone(), retention).await?;
        let media = self.put_media(media, retention).await?;
        let (thumbnails, skipped_thumbnails) = self.put_thumbnails(&media, retention).await?;

        let entry = LedgerEntry {
            bundle_sha256: bundle_sha256.clone(),
            bundle_version_id: bundle.version_id.clone(),
            media_version_ids: media.iter().map(|m| m.object.version_id.clone()).collect(),
            thumbnail_version_ids: thumbnails
                .iter()
                .map(|t| t.object.version_id.clone())
                .collect(),
            ingested_at: now,
            correlation_id,
        };
        let ledger_tx_id = self.ledger.append(&entry.ledger_key(), entry.to_payload()).await?;
        tracing::info!(%ledger_tx_id, media = media.len(), thumbnails = thumbnails.len(), "ingestion committed");

        Ok(IngestReceipt {
            bundle_sha256,
            correlation_id,
            dialect,
            bundle,
            media,
            thumbnails,
            skipped_thumbnails,
            signatures,
            signature_bypass: self.config.signatures.is_bypass(),
            ledger_tx_id,
            entry,
        })
    }

    /// Dialect-specific integrity validation. Returns the verified media
    /// set, or rejects with the complete accumulated report.
    fn validate(
        &self,
        dialect: DialectKind,
        files: &[ExtractedFile],
    ) -> IngestResult<(Vec<MediaFile>, Vec<SignatureRecord>)> {
        match dialect {
            DialectKind::Tella => {
                let entries = manifest::parse_tella(&manifest_path(files, TELLA_MANIFEST)?)?;
                let media = manifest::validate(&entries, files, TELLA_MANIFEST)?
                    .map_err(|report| IngestError::BundleRejected { report })?;
                Ok((media, Vec::new()))
            }
            DialectKind::EyeWitness => {
                let entries =
                    manifest::parse_eyewitness(&manifest_path(files, EYEWITNESS_MANIFEST)?)?;
                let media = manifest::validate(&entries, files, EYEWITNESS_MANIFEST)?
                    .map_err(|report| IngestError::BundleRejected { report })?;
                Ok((media, Vec::new()))
            }
            DialectKind::ProofMode => {
                let (records, report) = verify_signatures(files, &self.config)?;
                if !report.is_empty() {
                    return Err(IngestError::BundleRejected { report });
                }
                Ok((proofmode_media(files)?, records))
            }
        }
    }

    async fn put_bundle(
        &self,
        bundle_sha256: &str,
        bytes: Bytes,
        retention: Retention,
    ) -> IngestResult<StoredObject> {
        let request = PutRequest::new(
            ObjectKey::bundle(bundle_sha256),
            bytes,
            "application/zip",
            retention,
        );
        let receipt = self.store.put(request).await?;
        Ok(StoredObject::from_receipt(receipt, retention.until))
    }

    /// Store all media concurrently. The first failure cancels the rest
    /// and fails the whole ingestion before any ledger write.
    async fn put_media(
        &self,
        media: Vec<MediaFile>,
        retention: Retention,
    ) -> IngestResult<Vec<StoredMedia>> {
        let puts = media.into_iter().map(|file| {
            let store = Arc::clone(&self.store);
            async move {
                let content = tokio::fs::read(&file.disk_path).await?;
                let request = PutRequest::new(
                    ObjectKey::media(&file.sha256, file.extension()),
                    Bytes::from(content),
                    file.mime.clone(),
                    retention,
                );
                let receipt = store.put(request).await?;
                Ok::<_, IngestError>(StoredMedia {
                    object: StoredObject::from_receipt(receipt, retention.until),
                    file,
                })
            }
        });
        try_join_all(puts).await
    }

    /// Render and store thumbnails for image media. Render failures are
    /// collected, never fatal; store failures are.
    async fn put_thumbnails(
        &self,
        media: &[StoredMedia],
        retention: Retention,
    ) -> IngestResult<(Vec<ThumbnailArtifact>, Vec<ThumbnailSkipped>)> {
        let mut thumbnails = Vec::new();
        let mut skipped = Vec::new();

        for stored in media.iter().filter(|m| m.file.is_image()) {
            let content = tokio::fs::read(&stored.file.disk_path).await?;
            let rendered = match thumbnail::render(&content) {
                Ok(rendered) => rendered,
                Err(reason) => {
                    tracing::warn!(file = %stored.file.rel_path, %reason, "thumbnail skipped");
                    skipped.push(ThumbnailSkipped {
                        file: stored.file.rel_path.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let thumb_sha256 = sha256_hex(&rendered.bytes);
            let request = PutRequest::new(
                ObjectKey::thumbnail(&thumb_sha256),
                Bytes::from(rendered.bytes),
                "image/jpeg",
                retention,
            )
            .with_metadata("original_sha256", &stored.file.sha256)
            .with_metadata("original_width", rendered.original_width.to_string())
            .with_metadata("original_height", rendered.original_height.to_string());

            let receipt = self.store.put(request).await?;
            thumbnails.push(ThumbnailArtifact {
                object: StoredObject::from_receipt(receipt, retention.until),
                original_sha256: stored.file.sha256.clone(),
                original_width: rendered.original_width,
                original_height: rendered.original_height,
                width: rendered.width,
                height: rendered.height,
            });
        }

        Ok((thumbnails, skipped))
    }
}

fn manifest_path(files: &[ExtractedFile], rel: &str) -> IngestResult<std::path::PathBuf> {
    files
        .iter()
        .find(|f| f.rel_path == rel)
        .map(|f| f.disk_path.clone())
        .ok_or_else(|| IngestError::MalformedArchive {
            reason: format!("{rel} vanished from the scratch directory"),
        })
}

/// ProofMode has no manifest; media are all entries that are neither
/// signatures, key material, proofs nor sidecars of another entry.
fn proofmode_media(files: &[ExtractedFile]) -> IngestResult<Vec<MediaFile>> {
    let mut media = Vec::new();
    for file in files {
        if file.rel_path.ends_with(".asc")
            || file.rel_path.ends_with(".proof.json")
            || metadata::is_sidecar_of_any(&file.rel_path, files)
        {
            continue;
        }
        media.push(MediaFile {
            rel_path: file.rel_path.clone(),
            disk_path: file.disk_path.clone(),
            sha256: sha256_file(&file.disk_path)?,
            mime: mime_for_name(&file.rel_path),
            size: file.size,
            metadata: MediaMetadata::default(),
        });
    }
    Ok(media)
}
