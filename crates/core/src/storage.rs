//! Blob storage abstraction for uploaded assets.
//!
//! Assets are addressed by opaque, slash-separated keys. Uploads made before a
//! website exists live under [`TEMP_PREFIX`] and are moved into the website's
//! permanent space when content is submitted.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::imaging::OUTPUT_EXTENSION;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Key prefix for uploads not yet attached to a website.
pub const TEMP_PREFIX: &str = "tmp";

/// Key prefix for permanent per-website assets.
pub const WEBSITES_PREFIX: &str = "websites";

// ---------------------------------------------------------------------------
// Blob store contract
// ---------------------------------------------------------------------------

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Put/get/delete for binary assets.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<StoredBlob, CoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, CoreError>;

    async fn delete(&self, key: &str) -> Result<DeleteOutcome, CoreError>;

    /// Public retrieval URL for `key`.
    fn url_for(&self, key: &str) -> String;

    /// Inverse of [`url_for`](Self::url_for). `None` for URLs this store did
    /// not issue.
    fn key_for_url(&self, url: &str) -> Option<String>;

    /// Whether `url` points into the temporary upload area.
    fn is_temp_url(&self, url: &str) -> bool {
        self.key_for_url(url).is_some_and(|key| is_temp_key(&key))
    }
}

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

/// Key for a temporary upload: `tmp/<uuid>/<name>.jpg`.
pub fn temp_key(original_name: &str) -> String {
    format!(
        "{TEMP_PREFIX}/{}/{}.{OUTPUT_EXTENSION}",
        uuid::Uuid::new_v4(),
        sanitize_stem(original_name)
    )
}

/// Key for a permanent asset:
/// `websites/<id>/<placement>/<uuid>-<name>.jpg`.
pub fn website_key(website_id: DbId, placement_path: &str, original_name: &str) -> String {
    format!(
        "{WEBSITES_PREFIX}/{website_id}/{}/{}-{}.{OUTPUT_EXTENSION}",
        sanitize_segment(placement_path),
        uuid::Uuid::new_v4().simple(),
        sanitize_stem(original_name)
    )
}

pub fn is_temp_key(key: &str) -> bool {
    key.starts_with(&format!("{TEMP_PREFIX}/"))
}

/// Recover the sanitized original file name embedded in a key.
pub fn file_name_from_key(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// File stem reduced to `[a-z0-9_-]`, with a fallback for empty names.
pub fn sanitize_stem(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let cleaned = sanitize_segment(stem);
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' | '_' | '-' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '-',
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

/// Reject keys that could escape a storage root.
pub fn validate_key(key: &str) -> Result<(), CoreError> {
    let path = Path::new(key);
    let ok = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(CoreError::Storage(format!("Invalid storage key '{key}'")))
    }
}

// ---------------------------------------------------------------------------
// Local filesystem backend
// ---------------------------------------------------------------------------

/// Stores blobs as files under `root`, served publicly at `public_base`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredBlob, CoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CoreError::Storage(format!("Failed to write blob '{key}': {e}")))?;

        Ok(StoredBlob {
            key: key.to_string(),
            url: self.url_for(key),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CoreError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| CoreError::Storage(format!("Failed to read blob '{key}': {e}")))
    }

    async fn delete(&self, key: &str) -> Result<DeleteOutcome, CoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(CoreError::Storage(format!("Failed to delete blob '{key}': {e}"))),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.public_base)?.strip_prefix('/')?;
        validate_key(key).ok()?;
        Some(key.to_string())
    }
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Storage backend type selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendType {
    Local,
    S3,
}

impl StorageBackendType {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => Err(CoreError::Validation(format!(
                "Unknown storage backend type '{other}'. Must be one of: local, s3"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::S3 => "s3",
        }
    }
}

/// Validate that `config` contains the required keys for `backend_type`.
///
/// - `local`: requires `root` and `public_url`
/// - `s3`: requires `bucket` and `region`
pub fn validate_backend_config(
    backend_type: StorageBackendType,
    config: &serde_json::Value,
) -> Result<(), CoreError> {
    let obj = config
        .as_object()
        .ok_or_else(|| CoreError::Validation("Backend config must be a JSON object".into()))?;

    match backend_type {
        StorageBackendType::Local => {
            require_string_field(obj, "root", backend_type)?;
            require_string_field(obj, "public_url", backend_type)?;
        }
        StorageBackendType::S3 => {
            require_string_field(obj, "bucket", backend_type)?;
            require_string_field(obj, "region", backend_type)?;
        }
    }

    Ok(())
}

fn require_string_field(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    backend_type: StorageBackendType,
) -> Result<(), CoreError> {
    match obj.get(field) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(()),
        _ => Err(CoreError::Validation(format!(
            "Backend type '{}' requires a non-empty string field '{field}' in config",
            backend_type.name()
        ))),
    }
}
