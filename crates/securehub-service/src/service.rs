use std::sync::Arc;

use securehub_core::attachment::{AttachmentParent, AttachmentRecord};
use securehub_db::Database;
use securehub_store::ObjectStoreGateway;

use crate::{
    AttachmentConfig, AttachmentError, ConfirmationVerifier, DeletionCascade, DownloadLink,
    DownloadUrlIssuer, LimitEnforcer, OrphanReaper, UploadRequest, UploadSlot, UploadUrlIssuer,
};

/// Entry point for the attachment lifecycle.
///
/// Callers have already authorized the acting user against `parent`. Every
/// per-attachment call also checks that the attachment belongs to `parent`
/// and reports a mismatch as not found.
pub struct AttachmentService {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStoreGateway>,
    config: Arc<AttachmentConfig>,
    uploads: UploadUrlIssuer,
    verifier: ConfirmationVerifier,
    downloads: DownloadUrlIssuer,
    cascade: DeletionCascade,
}

impl AttachmentService {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn ObjectStoreGateway>,
        config: Arc<AttachmentConfig>,
    ) -> Self {
        let limits = Arc::new(LimitEnforcer::new(db.clone(), config.clone()));
        Self {
            uploads: UploadUrlIssuer::new(db.clone(), store.clone(), config.clone(), limits),
            verifier: ConfirmationVerifier::new(db.clone(), store.clone()),
            downloads: DownloadUrlIssuer::new(store.clone(), config.clone()),
            cascade: DeletionCascade::new(db.clone(), store.clone(), config.clone()),
            db,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AttachmentConfig {
        &self.config
    }

    /// A reaper sharing this service's database, store and configuration.
    pub fn reaper(&self) -> OrphanReaper {
        OrphanReaper::new(self.db.clone(), self.store.clone(), self.config.clone())
    }

    pub async fn request_upload_url(
        &self,
        parent: &AttachmentParent,
        request: &UploadRequest,
        uploaded_by: &str,
    ) -> Result<UploadSlot, AttachmentError> {
        self.uploads.issue(parent, request, uploaded_by).await
    }

    pub async fn confirm_upload(
        &self,
        parent: &AttachmentParent,
        attachment_id: &str,
    ) -> Result<AttachmentRecord, AttachmentError> {
        let record = self.owned(parent, attachment_id).await?;
        self.verifier.confirm(record).await
    }

    pub async fn download_url(
        &self,
        parent: &AttachmentParent,
        attachment_id: &str,
    ) -> Result<DownloadLink, AttachmentError> {
        let record = self.owned(parent, attachment_id).await?;
        self.downloads.issue(&record).await
    }

    /// All of the parent's attachments in any state, oldest first.
    pub async fn list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, AttachmentError> {
        Ok(self.db.list_attachments(parent).await?)
    }

    pub async fn delete_attachment(
        &self,
        parent: &AttachmentParent,
        attachment_id: &str,
    ) -> Result<(), AttachmentError> {
        let record = self.owned(parent, attachment_id).await?;
        self.cascade.delete_one(&record).await
    }

    /// Returns how many attachments were removed.
    pub async fn delete_all_for_parent(
        &self,
        parent: &AttachmentParent,
    ) -> Result<usize, AttachmentError> {
        self.cascade.delete_all_for_parent(parent).await
    }

    pub async fn delete_all_for_request(&self, request_id: &str) -> Result<usize, AttachmentError> {
        self.cascade.delete_all_for_request(request_id).await
    }

    async fn owned(
        &self,
        parent: &AttachmentParent,
        attachment_id: &str,
    ) -> Result<AttachmentRecord, AttachmentError> {
        let record = self.db.get_attachment(attachment_id).await?;
        if &record.parent != parent {
            return Err(AttachmentError::NotFound(format!(
                "attachment {attachment_id} on {parent}"
            )));
        }
        Ok(record)
    }
}
