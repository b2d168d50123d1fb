use std::path::PathBuf;

use schoolsite_core::storage::StorageBackendType;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `600`). Builds run inside the
    /// request, so this bounds the slowest accepted build.
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests after a shutdown signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT validation settings.
    pub jwt: JwtConfig,
    /// Blob storage backend settings.
    pub storage: StorageConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `600`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            storage: StorageConfig::from_env(),
        }
    }
}

/// Where uploaded assets are kept.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
    /// Root directory of the local backend. Also mounted into local builds.
    pub upload_dir: PathBuf,
    /// URL prefix under which local uploads are served (default: `/uploads`).
    pub public_upload_url: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_public_url: Option<String>,
    /// Endpoint override for S3 compatibles such as MinIO.
    pub s3_endpoint: Option<String>,
}

impl StorageConfig {
    /// | Env Var             | Default            |
    /// |---------------------|--------------------|
    /// | `STORAGE_BACKEND`   | `local`            |
    /// | `UPLOAD_DIR`        | `./data/uploads`   |
    /// | `PUBLIC_UPLOAD_URL` | `/uploads`         |
    /// | `S3_BUCKET`         | --                 |
    /// | `S3_REGION`         | --                 |
    /// | `S3_PUBLIC_URL`     | --                 |
    /// | `S3_ENDPOINT`       | --                 |
    pub fn from_env() -> Self {
        let backend = StorageBackendType::from_name(
            &std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".into()),
        )
        .expect("STORAGE_BACKEND must be 'local' or 's3'");

        Self {
            backend,
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "./data/uploads".into())
                .into(),
            public_upload_url: std::env::var("PUBLIC_UPLOAD_URL")
                .unwrap_or_else(|_| "/uploads".into()),
            s3_bucket: std::env::var("S3_BUCKET").ok(),
            s3_region: std::env::var("S3_REGION").ok(),
            s3_public_url: std::env::var("S3_PUBLIC_URL").ok(),
            s3_endpoint: std::env::var("S3_ENDPOINT").ok(),
        }
    }

    /// Backend settings as the JSON object accepted by
    /// [`validate_backend_config`](schoolsite_core::storage::validate_backend_config).
    pub fn backend_json(&self) -> serde_json::Value {
        match self.backend {
            StorageBackendType::Local => serde_json::json!({
                "root": self.upload_dir.display().to_string(),
                "public_url": self.public_upload_url,
            }),
            StorageBackendType::S3 => serde_json::json!({
                "bucket": self.s3_bucket,
                "region": self.s3_region,
                "public_url": self.s3_public_url,
                "endpoint": self.s3_endpoint,
            }),
        }
    }

    /// Whether uploads are served by this process under `public_upload_url`.
    pub fn serves_uploads(&self) -> bool {
        self.backend == StorageBackendType::Local && self.upload_mount().is_some()
    }

    /// Route prefix for locally served uploads: `public_upload_url` without a
    /// trailing slash, when it is a non-root absolute path.
    pub fn upload_mount(&self) -> Option<&str> {
        let mount = self.public_upload_url.trim_end_matches('/');
        (mount.starts_with('/') && mount.len() > 1).then_some(mount)
    }
}
