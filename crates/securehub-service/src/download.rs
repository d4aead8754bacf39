use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use securehub_core::attachment::{AttachmentRecord, AttachmentState};
use securehub_store::ObjectStoreGateway;

use crate::{AttachmentConfig, AttachmentError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub attachment_id: String,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
}

pub struct DownloadUrlIssuer {
    store: Arc<dyn ObjectStoreGateway>,
    config: Arc<AttachmentConfig>,
}

impl DownloadUrlIssuer {
    pub fn new(store: Arc<dyn ObjectStoreGateway>, config: Arc<AttachmentConfig>) -> Self {
        Self { store, config }
    }

    /// Sign a GET for an `ACTIVE` attachment, served with its stored content type.
    pub async fn issue(&self, record: &AttachmentRecord) -> Result<DownloadLink, AttachmentError> {
        if record.state != AttachmentState::Active {
            return Err(AttachmentError::Validation(
                "Attachment is not ready for download".into(),
            ));
        }
        let signed = self
            .store
            .presign_download(
                &record.object_key,
                &record.content_type,
                self.config.download_url_ttl,
            )
            .await?;
        Ok(DownloadLink {
            attachment_id: record.id.clone(),
            download_url: signed.url,
            expires_at: signed.expires_at,
        })
    }
}
