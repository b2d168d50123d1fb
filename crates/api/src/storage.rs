//! Blob store construction from [`StorageConfig`].

use std::sync::Arc;

use schoolsite_cloud::{S3BlobStore, S3Config};
use schoolsite_core::error::CoreError;
use schoolsite_core::storage::{
    validate_backend_config, BlobStore, LocalBlobStore, StorageBackendType,
};

use crate::config::StorageConfig;

/// Build the configured blob store, failing on incomplete settings.
pub async fn build_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, CoreError> {
    let backend_json = config.backend_json();
    validate_backend_config(config.backend, &backend_json)?;

    match config.backend {
        StorageBackendType::Local => {
            tokio::fs::create_dir_all(&config.upload_dir)
                .await
                .map_err(|e| {
                    CoreError::Storage(format!(
                        "Failed to create upload directory '{}': {e}",
                        config.upload_dir.display()
                    ))
                })?;
            tracing::info!(
                root = %config.upload_dir.display(),
                public_url = %config.public_upload_url,
                "Local blob store configured",
            );
            Ok(Arc::new(LocalBlobStore::new(
                config.upload_dir.clone(),
                config.public_upload_url.clone(),
            )))
        }
        StorageBackendType::S3 => {
            let s3 = S3Config::from_json(&backend_json)?;
            Ok(Arc::new(S3BlobStore::connect(&s3).await))
        }
    }
}
