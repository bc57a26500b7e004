//! Content-addressed evidence storage.
//!
//! A thin adapter between the pipeline and S3-compatible object storage.
//! The engine's internals stay external; this module only speaks a
//! put/presign/exists contract.
//!
//! # Design principles
//!
//! 1. **Content-addressed**: keys derive from `(role, sha256)`, so writes
//!    are idempotent and whole-bundle retries are safe.
//! 2. **Write-once**: every put requests a WORM retention lock; objects
//!    cannot be altered or deleted before expiry.
//! 3. **Versioned**: a put is only confirmed once the backend returns a
//!    version id. The ledger record is built from those ids.
//! 4. **Testable**: [`MemoryStore`] models the retention semantics for
//!    deterministic unit tests.

pub mod error;
pub mod memory;
pub mod naming;
pub mod object_backend;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use naming::{KeyBuilder, ObjectKey, ObjectRole};
pub use object_backend::ObjectStoreBackend;

use crate::config::RetentionMode;

/// Parsed store specification from CLI/config.
///
/// ```text
/// s3://my-bucket/custodia/evidence
/// file:///var/lib/custodia/store
/// memory://  (for testing)
/// ```
#[derive(Debug, Clone)]
pub struct StoreSpec {
    pub scheme: String,
    pub bucket: Option<String>,
    pub prefix: String,
    pub region: Option<String>,
}

impl StoreSpec {
    /// Parse a store URL like `s3://bucket/prefix` or `file:///path`.
    pub fn parse(url: &str) -> StoreResult<Self> {
        let parsed = url::Url::parse(url).map_err(|e| StoreError::InvalidSpec {
            spec: url.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme().to_string();
        let bucket = parsed.host_str().map(|s| s.to_string());
        let prefix = parsed.path().trim_start_matches('/').to_string();
        let region = parsed
            .query_pairs()
            .find(|(k, _)| k == "region")
            .map(|(_, v)| v.to_string());

        Ok(Self {
            scheme,
            bucket,
            prefix,
            region,
        })
    }

    pub fn is_memory(&self) -> bool {
        self.scheme == "memory"
    }

    pub fn is_file(&self) -> bool {
        self.scheme == "file"
    }
}

/// Retention lock requested for a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Retention {
    pub mode: RetentionMode,
    pub until: DateTime<Utc>,
}

/// One write to the store.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub key: ObjectKey,
    pub bytes: Bytes,
    pub content_type: String,
    pub retention: Retention,
    /// Opaque string metadata stored with the object (e.g. thumbnail
    /// back-references).
    pub metadata: BTreeMap<String, String>,
}

impl PutRequest {
    pub fn new(key: ObjectKey, bytes: Bytes, content_type: impl Into<String>, retention: Retention) -> Self {
        Self {
            key,
            bytes,
            content_type: content_type.into(),
            retention,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.metadata.insert(k.into(), v.into());
        self
    }
}

/// Confirmation of a completed write.
#[derive(Debug, Clone)]
pub struct PutReceipt {
    pub key: ObjectKey,
    pub version_id: String,
    pub etag: Option<String>,
}

/// A durable, write-once object as recorded in receipts and the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub key: ObjectKey,
    pub version_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub retention_until: DateTime<Utc>,
}

impl StoredObject {
    pub fn from_receipt(receipt: PutReceipt, retention_until: DateTime<Utc>) -> Self {
        Self {
            key: receipt.key,
            version_id: receipt.version_id,
            etag: receipt.etag,
            retention_until,
        }
    }
}

/// The storage collaborator contract.
///
/// # Idempotency
///
/// Putting identical bytes under the same (content-derived) key twice is
/// not an error: the second put resolves to the already-stored object and
/// returns its version id. That property is what makes whole-bundle
/// retries safe without in-process retry logic.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Write an object under its content-addressed key with a retention
    /// lock. Returns the backend-confirmed version id.
    async fn put(&self, request: PutRequest) -> StoreResult<PutReceipt>;

    /// Time-limited read URL for an object.
    async fn presigned_get(&self, key: &ObjectKey, ttl: Duration) -> StoreResult<url::Url>;

    /// Whether the configured bucket/container is reachable.
    async fn bucket_exists(&self) -> StoreResult<bool>;
}
