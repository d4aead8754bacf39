use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use securehub_core::attachment::{placeholder_object_key, AttachmentParent, NewAttachment};
use securehub_db::Database;
use securehub_store::{attachment_object_key, ObjectStoreGateway};

use crate::sanitize::{normalize_content_type, sanitize_file_name};
use crate::{AttachmentConfig, AttachmentError, LimitEnforcer};

/// What a client declares before uploading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    pub attachment_id: String,
    pub upload_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Validates a declared upload, reserves a `PENDING` record and signs a PUT.
pub struct UploadUrlIssuer {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStoreGateway>,
    config: Arc<AttachmentConfig>,
    limits: Arc<LimitEnforcer>,
}

impl UploadUrlIssuer {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn ObjectStoreGateway>,
        config: Arc<AttachmentConfig>,
        limits: Arc<LimitEnforcer>,
    ) -> Self {
        Self {
            db,
            store,
            config,
            limits,
        }
    }

    pub async fn issue(
        &self,
        parent: &AttachmentParent,
        request: &UploadRequest,
        uploaded_by: &str,
    ) -> Result<UploadSlot, AttachmentError> {
        if request.file_size <= 0 {
            return Err(AttachmentError::Validation(
                "File size must be positive".into(),
            ));
        }
        if request.file_size > self.config.max_file_size_bytes {
            return Err(AttachmentError::Validation(format!(
                "File size exceeds the maximum of {} bytes",
                self.config.max_file_size_bytes
            )));
        }

        let content_type = normalize_content_type(&request.content_type);
        if !self.config.is_allowed(&content_type) {
            return Err(AttachmentError::Validation(format!(
                "File type {:?} is not allowed",
                request.content_type
            )));
        }

        let file_name = sanitize_file_name(&request.file_name, self.config.max_file_name_length);

        let record = {
            let _guard = self.limits.lock(parent).await;
            self.limits.check(parent).await?;

            let now = Utc::now();
            let created = self
                .db
                .create_attachment(&NewAttachment {
                    parent: parent.clone(),
                    file_name,
                    content_type,
                    file_size: request.file_size,
                    object_key: placeholder_object_key(),
                    uploaded_by: uploaded_by.to_string(),
                    created_at: now,
                })
                .await?;

            let key = attachment_object_key(parent, &created.id, &created.file_name);
            self.db.set_object_key(&created.id, &key, now).await?
        };

        // A failed presign leaves the record pending for the reaper.
        let signed = self
            .store
            .presign_upload(
                &record.object_key,
                &record.content_type,
                record.file_size,
                self.config.upload_url_ttl,
            )
            .await?;

        info!(
            attachment_id = %record.id,
            parent = %parent,
            size = record.file_size,
            "upload slot issued"
        );

        Ok(UploadSlot {
            attachment_id: record.id,
            upload_url: signed.url,
            expires_at: signed.expires_at,
        })
    }
}
