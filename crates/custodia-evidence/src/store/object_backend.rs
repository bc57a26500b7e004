//! `object_store`-backed implementation of [`EvidenceStore`].
//!
//! Supports S3 and S3-compatible engines (MinIO, B2, R2), plus local
//! filesystem and in-memory backends via the `object_store` crate.
//!
//! Retention is carried as per-object metadata
//! (`x-custodia-retention-mode` / `x-custodia-retention-until`);
//! compliance-mode enforcement itself lives in the bucket's object-lock
//! configuration, which this adapter treats as external.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use object_store::{Attribute, Attributes, ObjectStore, PutMode, PutOptions, PutPayload};

use super::{
    EvidenceStore, KeyBuilder, ObjectKey, PutReceipt, PutRequest, StoreError, StoreResult,
    StoreSpec,
};

const RETENTION_MODE_META: &str = "x-custodia-retention-mode";
const RETENTION_UNTIL_META: &str = "x-custodia-retention-until";

/// Evidence store backed by `object_store`.
pub struct ObjectStoreBackend {
    inner: Arc<dyn ObjectStore>,
    keys: KeyBuilder,
}

impl ObjectStoreBackend {
    /// Create a store from a parsed spec.
    pub fn from_spec(spec: &StoreSpec) -> StoreResult<Self> {
        let inner: Arc<dyn ObjectStore> = match spec.scheme.as_str() {
            "memory" => Arc::new(object_store::memory::InMemory::new()),
            "file" => {
                let path = if let Some(bucket) = &spec.bucket {
                    format!("/{}/{}", bucket, spec.prefix)
                } else {
                    format!("/{}", spec.prefix)
                };
                std::fs::create_dir_all(&path).map_err(|e| StoreError::Unavailable {
                    message: format!("failed to create store directory {path}: {e}"),
                })?;
                Arc::new(
                    object_store::local::LocalFileSystem::new_with_prefix(&path).map_err(|e| {
                        StoreError::Unavailable {
                            message: format!("failed to open local store at {path}: {e}"),
                        }
                    })?,
                )
            }
            "s3" => {
                let bucket = spec
                    .bucket
                    .as_ref()
                    .ok_or_else(|| StoreError::InvalidSpec {
                        spec: format!("s3://{:?}/{}", spec.bucket, spec.prefix),
                        reason: "S3 URL must include bucket name".to_string(),
                    })?;

                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(false);
                if let Some(region) = &spec.region {
                    builder = builder.with_region(region);
                }

                Arc::new(builder.build().map_err(|e| StoreError::Unavailable {
                    message: format!("failed to create S3 client: {e}"),
                })?)
            }
            scheme => {
                return Err(StoreError::InvalidSpec {
                    spec: spec.scheme.clone(),
                    reason: format!("unsupported scheme: {scheme}"),
                })
            }
        };

        Ok(Self {
            inner,
            keys: KeyBuilder::new(spec.prefix.as_str()),
        })
    }

    /// Create a store from a URL string.
    pub fn from_url(url: &str) -> StoreResult<Self> {
        Self::from_spec(&StoreSpec::parse(url)?)
    }

    /// In-memory backend, for tests.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(object_store::memory::InMemory::new()),
            keys: KeyBuilder::new(""),
        }
    }

    fn attributes_for(request: &PutRequest) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(Attribute::ContentType, request.content_type.clone().into());
        attrs.insert(
            Attribute::Metadata(Cow::Borrowed(RETENTION_MODE_META)),
            request.retention.mode.as_str().into(),
        );
        attrs.insert(
            Attribute::Metadata(Cow::Borrowed(RETENTION_UNTIL_META)),
            request.retention.until.to_rfc3339().into(),
        );
        for (k, v) in &request.metadata {
            attrs.insert(Attribute::Metadata(Cow::Owned(k.clone())), v.clone().into());
        }
        attrs
    }

    fn confirm(
        key: ObjectKey,
        path: &object_store::path::Path,
        version: Option<String>,
        etag: Option<String>,
    ) -> StoreResult<PutReceipt> {
        // The collaborator contract requires versioning; an id the ledger
        // can anchor must come back from the backend.
        let version_id = version
            .clone()
            .or_else(|| etag.clone())
            .ok_or_else(|| StoreError::WriteRejected {
                key: path.as_ref().to_string(),
                reason: "backend returned no version id or etag".to_string(),
            })?;
        Ok(PutReceipt {
            key,
            version_id,
            etag,
        })
    }
}

#[async_trait]
impl EvidenceStore for ObjectStoreBackend {
    async fn put(&self, request: PutRequest) -> StoreResult<PutReceipt> {
        let path = self.keys.path(&request.key);
        let opts = PutOptions {
            mode: PutMode::Create,
            attributes: Self::attributes_for(&request),
            ..Default::default()
        };

        match self
            .inner
            .put_opts(&path, PutPayload::from(request.bytes.clone()), opts)
            .await
        {
            Ok(result) => Self::confirm(request.key, &path, result.version, result.e_tag),
            Err(object_store::Error::AlreadyExists { .. }) => {
                // Content-addressed key already present: resolve the
                // existing object's version id instead of rewriting.
                tracing::debug!(key = %path, "object already stored, resolving existing version");
                let meta = self
                    .inner
                    .head(&path)
                    .await
                    .map_err(|e| StoreError::from_object_store(e, path.as_ref()))?;
                Self::confirm(request.key, &path, meta.version, meta.e_tag)
            }
            Err(e) => Err(StoreError::from_object_store(e, path.as_ref())),
        }
    }

    async fn presigned_get(&self, key: &ObjectKey, _ttl: Duration) -> StoreResult<url::Url> {
        // URL signing is delegated to the deployment's gateway.
        Err(StoreError::Unsupported {
            operation: format!("presigned_get({})", self.keys.path(key)),
        })
    }

    async fn bucket_exists(&self) -> StoreResult<bool> {
        match self.inner.list_with_delimiter(None).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StoreError::Unavailable {
                message: format!("bucket probe failed: {e}"),
            }),
        }
    }
}
