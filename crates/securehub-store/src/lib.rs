mod local;
pub mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStore;
pub use mock::MockGateway;
#[cfg(feature = "s3")]
pub use s3::S3Gateway;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use securehub_core::attachment::AttachmentParent;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// A time-limited URL granting one operation on one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of checking whether an object exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectProbe {
    Absent,
    /// `size` is `None` when the backend did not report a content length.
    Present { size: Option<i64> },
}

/// The object store that holds attachment bytes.
///
/// The application never moves bytes through this trait: clients upload and
/// download directly against signed URLs. The bucket is fixed when the
/// gateway is built.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    /// Sign a PUT for `key`.
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        size: i64,
        ttl: Duration,
    ) -> Result<SignedUrl, StoreError>;

    /// Sign a GET for `key` that serves the body as `response_content_type`.
    async fn presign_download(
        &self,
        key: &str,
        response_content_type: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StoreError>;

    /// Check for an object. A missing object is `ObjectProbe::Absent`, not an error.
    async fn probe(&self, key: &str) -> Result<ObjectProbe, StoreError>;

    /// Delete an object. No-op if absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Absolute expiry of a URL signed now for `ttl`.
pub(crate) fn expiry_after(ttl: Duration) -> Result<DateTime<Utc>, StoreError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| StoreError::Internal(format!("ttl out of range: {e}")))?;
    Ok(Utc::now() + ttl)
}

// -- Key helpers --

pub fn request_attachment_key(request_id: &str, attachment_id: &str, file_name: &str) -> String {
    format!("requests/{request_id}/attachments/{attachment_id}/{file_name}")
}

pub fn comment_attachment_key(
    request_id: &str,
    comment_id: &str,
    attachment_id: &str,
    file_name: &str,
) -> String {
    format!("requests/{request_id}/comments/{comment_id}/attachments/{attachment_id}/{file_name}")
}

/// The object key for an attachment, derived from its owner, id and sanitized name.
pub fn attachment_object_key(
    parent: &AttachmentParent,
    attachment_id: &str,
    file_name: &str,
) -> String {
    match parent {
        AttachmentParent::Request { request_id } => {
            request_attachment_key(request_id, attachment_id, file_name)
        }
        AttachmentParent::Comment {
            request_id,
            comment_id,
        } => comment_attachment_key(request_id, comment_id, attachment_id, file_name),
    }
}

// -- Configuration --

pub const DEFAULT_BUCKET: &str = "securehub-attachments-local";
pub const DEFAULT_REGION: &str = "ap-southeast-2";

/// Configuration for the object store backend.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// S3-compatible endpoint URL (e.g., "http://127.0.0.1:9000").
    /// When `None`, the AWS endpoint for `region` is used.
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Local filesystem base directory (used when S3 is not configured).
    pub local_data_dir: Option<String>,
}

impl StoreConfig {
    /// Build from environment variables.
    /// `SECUREHUB_S3_*` wins over the matching `AWS_*` variable. S3 is used
    /// once credentials are present; otherwise the local filesystem.
    pub fn from_env() -> Self {
        Self {
            endpoint_url: std::env::var("SECUREHUB_S3_ENDPOINT")
                .or_else(|_| std::env::var("AWS_ENDPOINT_URL"))
                .ok(),
            region: std::env::var("SECUREHUB_S3_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .ok(),
            bucket: std::env::var("SECUREHUB_S3_BUCKET").ok(),
            access_key_id: std::env::var("SECUREHUB_S3_ACCESS_KEY_ID")
                .or_else(|_| std::env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_access_key: std::env::var("SECUREHUB_S3_SECRET_ACCESS_KEY")
                .or_else(|_| std::env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            local_data_dir: std::env::var("SECUREHUB_OBJECT_DIR").ok(),
        }
    }

    pub fn is_s3(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    pub fn bucket_name(&self) -> &str {
        self.bucket.as_deref().unwrap_or(DEFAULT_BUCKET)
    }

    pub fn region_name(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }
}

// -- Factory --

/// Create an `ObjectStoreGateway` from configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStoreGateway>, StoreError> {
    if config.is_s3() {
        #[cfg(feature = "s3")]
        {
            tracing::info!(bucket = config.bucket_name(), "using S3 object store");
            Ok(Arc::new(S3Gateway::new(config)?))
        }
        #[cfg(not(feature = "s3"))]
        {
            Err(StoreError::Internal(
                "S3 configuration detected but the 's3' feature is not enabled".into(),
            ))
        }
    } else {
        let store = LocalStore::new(config);
        tracing::info!(dir = %store.base_dir().display(), "using local object store");
        Ok(Arc::new(store))
    }
}
