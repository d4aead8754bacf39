use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use crate::{expiry_after, ObjectProbe, ObjectStoreGateway, SignedUrl, StoreConfig, StoreError};

/// SigV4 presigned URLs cannot outlive seven days.
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

pub struct S3Gateway {
    bucket: Box<Bucket>,
}

impl std::fmt::Debug for S3Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Gateway")
            .field("bucket", &self.bucket.name())
            .finish_non_exhaustive()
    }
}

impl S3Gateway {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let region = match &config.endpoint_url {
            Some(endpoint) => Region::Custom {
                region: config.region_name().to_string(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region_name()
                .parse::<Region>()
                .map_err(|e| StoreError::Internal(format!("region: {e}")))?,
        };

        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Internal(format!("credentials: {e}")))?;

        let mut bucket = Bucket::new(config.bucket_name(), region, credentials)
            .map_err(|e| StoreError::Internal(format!("bucket: {e}")))?;
        if config.endpoint_url.is_some() {
            bucket.set_path_style();
        }

        Ok(Self { bucket })
    }
}

fn map_s3_error(e: S3Error) -> StoreError {
    StoreError::Internal(format!("s3: {e}"))
}

fn expiry_secs(ttl: Duration) -> u32 {
    ttl.as_secs().clamp(1, MAX_PRESIGN_SECS) as u32
}

#[async_trait]
impl ObjectStoreGateway for S3Gateway {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        size: i64,
        ttl: Duration,
    ) -> Result<SignedUrl, StoreError> {
        // Both headers become signed headers: the PUT must send exactly these.
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type)
                .map_err(|e| StoreError::Internal(format!("content type {content_type:?}: {e}")))?,
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        tracing::debug!(key, content_type, size, "presigning upload");
        let url = self
            .bucket
            .presign_put(key, expiry_secs(ttl), Some(headers), None)
            .await
            .map_err(map_s3_error)?;
        Ok(SignedUrl {
            url,
            expires_at: expiry_after(ttl)?,
        })
    }

    async fn presign_download(
        &self,
        key: &str,
        response_content_type: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StoreError> {
        let mut queries = HashMap::new();
        queries.insert(
            "response-content-type".to_string(),
            response_content_type.to_string(),
        );
        let url = self
            .bucket
            .presign_get(key, expiry_secs(ttl), Some(queries))
            .await
            .map_err(map_s3_error)?;
        Ok(SignedUrl {
            url,
            expires_at: expiry_after(ttl)?,
        })
    }

    async fn probe(&self, key: &str) -> Result<ObjectProbe, StoreError> {
        let (head, status) = self.bucket.head_object(key).await.map_err(map_s3_error)?;
        match status {
            404 => Ok(ObjectProbe::Absent),
            200..=299 => Ok(ObjectProbe::Present {
                size: head.content_length,
            }),
            other => Err(StoreError::Internal(format!(
                "s3 head {key}: status {other}"
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self.bucket.delete_object(key).await.map_err(map_s3_error)?;
        match response.status_code() {
            404 => Ok(()),
            code if code >= 400 => Err(StoreError::Internal(format!(
                "s3 delete {key}: status {code}"
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_config() -> StoreConfig {
        StoreConfig {
            endpoint_url: Some("http://localhost:9000".into()),
            region: Some("us-east-1".into()),
            bucket: Some("test-bucket".into()),
            access_key_id: Some("key".into()),
            secret_access_key: Some("secret".into()),
            local_data_dir: None,
        }
    }

    #[test]
    fn valid_config_creates_gateway() {
        assert!(S3Gateway::new(&custom_config()).is_ok());
    }

    #[test]
    fn default_bucket_and_region_are_used() {
        let config = StoreConfig {
            access_key_id: Some("key".into()),
            secret_access_key: Some("secret".into()),
            ..Default::default()
        };
        let gateway = S3Gateway::new(&config).unwrap();
        assert_eq!(gateway.bucket.name(), "securehub-attachments-local");
    }

    #[test]
    fn expiry_is_clamped() {
        assert_eq!(expiry_secs(Duration::from_secs(300)), 300);
        assert_eq!(expiry_secs(Duration::from_millis(10)), 1);
        assert_eq!(
            expiry_secs(Duration::from_secs(30 * 24 * 60 * 60)),
            MAX_PRESIGN_SECS as u32
        );
    }

    #[tokio::test]
    async fn presigned_urls_are_local_computations() {
        let gateway = S3Gateway::new(&custom_config()).unwrap();
        let put = gateway
            .presign_upload(
                "requests/r1/attachments/a1/scan.pdf",
                "application/pdf",
                1024,
                Duration::from_secs(300),
            )
            .await
            .unwrap();
        assert!(put.url.contains("requests/r1/attachments/a1/scan.pdf"));
        assert!(put.url.contains("X-Amz-Expires=300"));
        let signed = put
            .url
            .split('&')
            .find_map(|pair| pair.strip_prefix("X-Amz-SignedHeaders="))
            .unwrap();
        assert!(signed.contains("content-type"), "{signed}");
        assert!(signed.contains("content-length"), "{signed}");

        let get = gateway
            .presign_download("requests/r1/attachments/a1/scan.pdf", "application/pdf", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(get.url.contains("response-content-type=application%2Fpdf"));
    }

    // -- S3 integration tests (require a running S3-compatible service) --

    fn s3_config() -> Option<StoreConfig> {
        let config = StoreConfig::from_env();
        if config.is_s3() {
            Some(config)
        } else {
            None
        }
    }

    #[tokio::test]
    #[ignore]
    async fn s3_presigned_upload_then_probe_and_delete() {
        let config = s3_config().expect("S3 not configured, skipped via #[ignore]");
        let gateway = S3Gateway::new(&config).unwrap();
        let key = "integration-test/presigned-roundtrip.txt";
        let body = b"hello s3".to_vec();

        let slot = gateway
            .presign_upload(key, "text/plain", body.len() as i64, Duration::from_secs(60))
            .await
            .unwrap();
        let client = reqwest::Client::new();
        let response = client
            .put(&slot.url)
            .header("content-type", "text/plain")
            .body(body.clone())
            .send().await.unwrap();
        assert!(response.status().is_success());

        assert_eq!(
            gateway.probe(key).await.unwrap(),
            ObjectProbe::Present {
                size: Some(body.len() as i64)
            }
        );

        let link = gateway
            .presign_download(key, "text/plain", Duration::from_secs(60))
            .await
            .unwrap();
        let fetched = client.get(&link.url).send().await.unwrap();
        assert_eq!(
            fetched.headers().get("content-type").unwrap(),
            "text/plain"
        );
        assert_eq!(fetched.bytes().await.unwrap().as_ref(), body.as_slice());

        gateway.delete(key).await.unwrap();
        assert_eq!(gateway.probe(key).await.unwrap(), ObjectProbe::Absent);
    }

    #[tokio::test]
    #[ignore]
    async fn s3_probe_missing_is_absent() {
        let config = s3_config().expect("S3 not configured, skipped via #[ignore]");
        let gateway = S3Gateway::new(&config).unwrap();
        assert_eq!(
            gateway
                .probe("integration-test/nonexistent-key-12345")
                .await
                .unwrap(),
            ObjectProbe::Absent
        );
    }

    #[tokio::test]
    #[ignore]
    async fn s3_delete_nonexistent_is_noop() {
        let config = s3_config().expect("S3 not configured, skipped via #[ignore]");
        let gateway = S3Gateway::new(&config).unwrap();
        gateway
            .delete("integration-test/nonexistent-delete-target")
            .await
            .unwrap();
    }
}
