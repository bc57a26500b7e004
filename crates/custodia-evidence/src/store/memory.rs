//! In-memory store fake with WORM semantics.
//!
//! Deterministic stand-in for the object-storage collaborator in tests:
//! uuid version ids, recorded retention locks, write-once keys. Identical
//! re-puts resolve idempotently; diverging bytes under an existing key
//! are a conflict, retention lock or not.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{
    EvidenceStore, KeyBuilder, ObjectKey, ObjectRole, PutReceipt, PutRequest, StoreError,
    StoreResult,
};
use crate::hash::sha256_hex;

#[derive(Debug, Clone)]
struct StoredEntry {
    bytes: Bytes,
    content_type: String,
    version_id: String,
    etag: String,
    retention_until: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
}

/// Test double for [`EvidenceStore`].
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredEntry>>,
    keys: KeyBuilder,
    /// When set, puts for this role fail with `Unavailable`. Lets tests
    /// exercise the all-or-nothing commit path.
    fail_role: Mutex<Option<ObjectRole>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            keys: KeyBuilder::new(prefix),
            ..Self::new()
        }
    }

    /// Make every put for `role` fail until cleared.
    pub fn fail_puts_for(&self, role: ObjectRole) {
        *self.fail_role.lock().unwrap() = Some(role);
    }

    pub fn clear_failures(&self) {
        *self.fail_role.lock().unwrap() = None;
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(self.keys.path(key).as_ref())
    }

    pub fn bytes_of(&self, key: &ObjectKey) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(self.keys.path(key).as_ref())
            .map(|e| e.bytes.clone())
    }

    pub fn content_type_of(&self, key: &ObjectKey) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(self.keys.path(key).as_ref())
            .map(|e| e.content_type.clone())
    }

    pub fn metadata_of(&self, key: &ObjectKey) -> Option<BTreeMap<String, String>> {
        self.objects
            .lock()
            .unwrap()
            .get(self.keys.path(key).as_ref())
            .map(|e| e.metadata.clone())
    }

    pub fn retention_of(&self, key: &ObjectKey) -> Option<DateTime<Utc>> {
        self.objects
            .lock()
            .unwrap()
            .get(self.keys.path(key).as_ref())
            .map(|e| e.retention_until)
    }

    /// All stored paths, sorted. Handy for test assertions.
    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl EvidenceStore for MemoryStore {
    async fn put(&self, request: PutRequest) -> StoreResult<PutReceipt> {
        if *self.fail_role.lock().unwrap() == Some(request.key.role) {
            return Err(StoreError::Unavailable {
                message: format!("injected failure for role {}", request.key.role.as_str()),
            });
        }

        let path = self.keys.path(&request.key).as_ref().to_string();
        let mut objects = self.objects.lock().unwrap();

        if let Some(existing) = objects.get(&path) {
            if existing.bytes == request.bytes {
                // Idempotent re-put of identical content.
                return Ok(PutReceipt {
                    key: request.key,
                    version_id: existing.version_id.clone(),
                    etag: Some(existing.etag.clone()),
                });
            }
            return Err(StoreError::Conflict { key: path });
        }

        let entry = StoredEntry {
            etag: sha256_hex(&request.bytes),
            bytes: request.bytes,
            content_type: request.content_type,
            version_id: uuid::Uuid::new_v4().to_string(),
            retention_until: request.retention.until,
            metadata: request.metadata,
        };
        let receipt = PutReceipt {
            key: request.key,
            version_id: entry.version_id.clone(),
            etag: Some(entry.etag.clone()),
        };
        objects.insert(path, entry);
        Ok(receipt)
    }

    async fn presigned_get(&self, key: &ObjectKey, ttl: Duration) -> StoreResult<url::Url> {
        let path = self.keys.path(key).as_ref().to_string();
        if !self.objects.lock().unwrap().contains_key(&path) {
            return Err(StoreError::NotFound { key: path });
        }
        url::Url::parse(&format!("memory:///{path}?ttl={}", ttl.as_secs())).map_err(|e| {
            StoreError::Other(anyhow::anyhow!("presign url: {e}"))
        })
    }

    async fn bucket_exists(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetentionMode;
    use crate::store::Retention;

    fn retention() -> Retention {
        Retention {
            mode: RetentionMode::Compliance,
            until: Utc::now() + chrono::Duration::days(7),
        }
    }

    #[tokio::test]
    async fn put_and_idempotent_reput() {
        let store = MemoryStore::new();
        let key = ObjectKey::media("aa".repeat(32), Some(".jpg".into()));
        let req = PutRequest::new(
            key.clone(),
            Bytes::from_static(b"pixels"),
            "image/jpeg",
            retention(),
        );

        let first = store.put(req.clone()).await.unwrap();
        let second = store.put(req).await.unwrap();
        assert_eq!(first.version_id, second.version_id);
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn diverging_bytes_conflict() {
        let store = MemoryStore::new();
        let key = ObjectKey::media("aa".repeat(32), None);
        store
            .put(PutRequest::new(
                key.clone(),
                Bytes::from_static(b"one"),
                "application/octet-stream",
                retention(),
            ))
            .await
            .unwrap();
        let err = store
            .put(PutRequest::new(
                key,
                Bytes::from_static(b"two"),
                "application/octet-stream",
                retention(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn retention_is_recorded() {
        let store = MemoryStore::new();
        let key = ObjectKey::bundle("bb".repeat(32));
        let lock = retention();
        store
            .put(PutRequest::new(
                key.clone(),
                Bytes::from_static(b"zip"),
                "application/zip",
                lock,
            ))
            .await
            .unwrap();
        assert_eq!(store.retention_of(&key), Some(lock.until));
    }

    #[tokio::test]
    async fn injected_failure_only_hits_requested_role() {
        let store = MemoryStore::new();
        store.fail_puts_for(ObjectRole::Media);

        let media = PutRequest::new(
            ObjectKey::media("cc".repeat(32), None),
            Bytes::from_static(b"m"),
            "application/octet-stream",
            retention(),
        );
        assert!(store.put(media).await.is_err());

        let bundle = PutRequest::new(
            ObjectKey::bundle("dd".repeat(32)),
            Bytes::from_static(b"z"),
            "application/zip",
            retention(),
        );
        assert!(store.put(bundle).await.is_ok());
    }

    #[tokio::test]
    async fn presign_requires_existing_object() {
        let store = MemoryStore::new();
        let key = ObjectKey::bundle("ee".repeat(32));
        assert!(store
            .presigned_get(&key, Duration::from_secs(60))
            .await
            .is_err());
    }
}
