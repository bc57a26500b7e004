//! Error types for evidence storage operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the object-storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object exists with different bytes than the write attempted.
    /// On content-addressed keys this should be unreachable; it indicates
    /// either a hash collision or a corrupted prior write.
    #[error("key conflict: {key}")]
    Conflict { key: String },

    /// Object not found.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// The backend refused the write (retention, versioning, permissions).
    #[error("write rejected for {key}: {reason}")]
    WriteRejected { key: String, reason: String },

    /// The backend is unreachable or failing.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// Invalid store specification (URL parsing failed).
    #[error("invalid store spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// The storage backend doesn't support a required operation.
    #[error("operation not supported: {operation}")]
    Unsupported { operation: String },

    /// Generic error from the underlying object store.
    #[error("object store error: {0}")]
    ObjectStore(object_store::Error),

    /// Other errors.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Wrap an `object_store` error with the key it concerns.
    pub fn from_object_store(err: object_store::Error, key: &str) -> Self {
        match &err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                key: key.to_string(),
            },
            _ => StoreError::ObjectStore(err),
        }
    }
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        StoreError::from_object_store(err, "unknown")
    }
}
