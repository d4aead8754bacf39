use std::sync::Arc;

use tracing::{info, warn};

use securehub_core::attachment::{AttachmentParent, AttachmentRecord};
use securehub_db::{Database, DbError};
use securehub_store::{ObjectStoreGateway, StoreError};

use crate::retry::delete_with_retry;
use crate::{AttachmentConfig, AttachmentError};

/// Removes attachments together with their objects.
///
/// The object goes first; a row is deleted only once its object is gone, so a
/// failed delete leaves a row the caller can retry against.
pub struct DeletionCascade {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStoreGateway>,
    config: Arc<AttachmentConfig>,
}

impl DeletionCascade {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn ObjectStoreGateway>,
        config: Arc<AttachmentConfig>,
    ) -> Self {
        Self { db, store, config }
    }

    /// Delete one attachment. Its row disappearing concurrently is not an error.
    pub async fn delete_one(&self, record: &AttachmentRecord) -> Result<(), AttachmentError> {
        delete_with_retry(
            &*self.store,
            &record.object_key,
            self.config.delete_retry_attempts,
            self.config.delete_retry_backoff,
        )
        .await?;
        match self.db.delete_attachment(&record.id).await {
            Ok(_) | Err(DbError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_all_for_parent(&self, parent: &AttachmentParent) -> Result<usize, AttachmentError> {
        let records = self.db.list_attachments(parent).await?;
        self.delete_records(&parent.to_string(), records).await
    }

    /// Everything under a request, comment-owned attachments included.
    pub async fn delete_all_for_request(&self, request_id: &str) -> Result<usize, AttachmentError> {
        let records = self.db.list_attachments_for_request(request_id).await?;
        self.delete_records(&format!("request {request_id}"), records).await
    }

    async fn delete_records(
        &self,
        scope: &str,
        records: Vec<AttachmentRecord>,
    ) -> Result<usize, AttachmentError> {
        let total = records.len();
        let mut removed = 0usize;
        let mut failed = 0usize;

        for record in &records {
            match self.delete_one(record).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(attachment_id = %record.id, error = %e, "cascade delete failed");
                    failed += 1;
                }
            }
        }

        info!(scope, total, removed, failed, "attachment cascade finished");
        if failed > 0 {
            return Err(AttachmentError::Storage(StoreError::Internal(format!(
                "{failed} of {total} attachments under {scope} could not be deleted"
            ))));
        }
        Ok(removed)
    }
}
