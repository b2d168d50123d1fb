//! S3-compatible implementation of [`BlobStore`].
//!
//! Works against AWS S3 and self-hosted compatibles (MinIO) via an optional
//! endpoint override with path-style addressing.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::Deserialize;

use schoolsite_core::error::CoreError;
use schoolsite_core::storage::{
    validate_backend_config, validate_key, BlobStore, DeleteOutcome, StorageBackendType,
    StoredBlob,
};

/// Connection settings for the S3 backend.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Public base URL for issued links. Defaults to the virtual-hosted
    /// bucket URL.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Endpoint override for S3 compatibles. Enables path-style addressing.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl S3Config {
    /// Parse a backend config object, checking the required keys first.
    pub fn from_json(config: &serde_json::Value) -> Result<Self, CoreError> {
        validate_backend_config(StorageBackendType::S3, config)?;
        serde_json::from_value(config.clone())
            .map_err(|e| CoreError::Validation(format!("Invalid S3 backend config: {e}")))
    }

    fn public_base(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

/// Blob store backed by a single S3 bucket.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3BlobStore {
    /// Build a client from the ambient AWS environment, overridden by any
    /// values present in `config`.
    pub async fn connect(config: &S3Config) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "schoolsite-config",
            ));
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
        }

        tracing::info!(bucket = %config.bucket, region = %config.region, "S3 blob store configured");
        Self::with_client(Client::from_conf(builder.build()), config)
    }

    pub fn with_client(client: Client, config: &S3Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            public_base: config.public_base(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn storage_error(action: &str, key: &str, err: impl std::error::Error) -> CoreError {
    CoreError::Storage(format!(
        "S3 {action} failed for '{key}': {}",
        DisplayErrorContext(err)
    ))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredBlob, CoreError> {
        validate_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| storage_error("put", key, e))?;

        Ok(StoredBlob {
            key: key.to_string(),
            url: self.url_for(key),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CoreError> {
        validate_key(key)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("get", key, e))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| storage_error("read", key, e))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<DeleteOutcome, CoreError> {
        validate_key(key)?;

        // DeleteObject succeeds for missing keys, so probe first.
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                return Ok(DeleteOutcome::NotFound);
            }
            Err(e) => return Err(storage_error("head", key, e)),
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("delete", key, e))?;
        Ok(DeleteOutcome::Deleted)
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
