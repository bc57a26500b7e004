//! Key naming for content-addressed evidence storage.
//!
//! # Key schema
//!
//! ```text
//! {base_prefix}/bundle/{sha256}.zip        # the submitted archive
//! {base_prefix}/media/{sha256}{ext}       # each verified media file
//! {base_prefix}/thumbnail/{sha256}.jpg    # derived thumbnails
//! ```
//!
//! Keys are pure functions of `(role, content hash [, extension])`.
//! Re-ingesting identical bytes reproduces the identical key, which is
//! what makes whole-bundle retries safe.

use serde::Serialize;

/// Role of a stored object within a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectRole {
    Bundle,
    Media,
    Thumbnail,
}

impl ObjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Media => "media",
            Self::Thumbnail => "thumbnail",
        }
    }
}

/// A content-addressed object key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectKey {
    pub role: ObjectRole,
    /// Lower-case sha256 hex of the object's bytes.
    pub sha256: String,
    /// Extension including the leading dot (e.g. `.jpg`), or empty.
    pub ext: String,
}

impl ObjectKey {
    pub fn bundle(sha256: impl Into<String>) -> Self {
        Self {
            role: ObjectRole::Bundle,
            sha256: sha256.into(),
            ext: ".zip".to_string(),
        }
    }

    pub fn media(sha256: impl Into<String>, ext: Option<String>) -> Self {
        Self {
            role: ObjectRole::Media,
            sha256: sha256.into(),
            ext: ext.unwrap_or_default(),
        }
    }

    pub fn thumbnail(sha256: impl Into<String>) -> Self {
        Self {
            role: ObjectRole::Thumbnail,
            sha256: sha256.into(),
            ext: ".jpg".to_string(),
        }
    }

    /// Render without any base prefix: `{role}/{hash}{ext}`.
    pub fn relative(&self) -> String {
        format!("{}/{}{}", self.role.as_str(), self.sha256, self.ext)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.relative())
    }
}

/// Renders [`ObjectKey`]s under a base prefix.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    base_prefix: String,
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("")
    }
}

impl KeyBuilder {
    pub fn new(base_prefix: impl Into<String>) -> Self {
        let prefix = base_prefix.into().trim_matches('/').to_string();
        Self {
            base_prefix: prefix,
        }
    }

    /// Full storage path for a key.
    pub fn path(&self, key: &ObjectKey) -> object_store::path::Path {
        if self.base_prefix.is_empty() {
            object_store::path::Path::from(key.relative())
        } else {
            object_store::path::Path::from(format!("{}/{}", self.base_prefix, key.relative()))
        }
    }
}
