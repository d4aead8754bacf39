use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use securehub_core::attachment::{AttachmentRecord, AttachmentState};
use securehub_db::{Database, DbError};
use securehub_store::{ObjectProbe, ObjectStoreGateway};

use crate::AttachmentError;

const MSG_FAILED: &str = "Attachment is in FAILED state and cannot be confirmed";
const MSG_SIZE_MISMATCH: &str = "Uploaded file size does not match metadata";
const MSG_MISSING: &str = "Attachment object was not found in storage";

/// Checks an uploaded object against its record and settles the record's state.
pub struct ConfirmationVerifier {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStoreGateway>,
}

impl ConfirmationVerifier {
    pub fn new(db: Arc<dyn Database>, store: Arc<dyn ObjectStoreGateway>) -> Self {
        Self { db, store }
    }

    pub async fn confirm(&self, record: AttachmentRecord) -> Result<AttachmentRecord, AttachmentError> {
        match record.state {
            AttachmentState::Active => return Ok(record),
            AttachmentState::Failed => return Err(AttachmentError::Validation(MSG_FAILED.into())),
            AttachmentState::Pending => {}
        }

        // Probe errors other than absence leave the record pending.
        let probe = self.store.probe(&record.object_key).await?;

        let failure = match probe {
            ObjectProbe::Absent => MSG_MISSING,
            ObjectProbe::Present { size } if size != Some(record.file_size) => {
                warn!(
                    attachment_id = %record.id,
                    declared = record.file_size,
                    actual = ?size,
                    "uploaded size mismatch"
                );
                MSG_SIZE_MISMATCH
            }
            ObjectProbe::Present { .. } => {
                let active = self.settle(&record, AttachmentState::Active).await?;
                info!(attachment_id = %active.id, "attachment confirmed");
                return Ok(active);
            }
        };

        let failed = self.settle(&record, AttachmentState::Failed).await?;
        if failed.state == AttachmentState::Active {
            // A concurrent confirmation won.
            return Ok(failed);
        }
        warn!(attachment_id = %record.id, reason = failure, "attachment marked failed");
        Err(AttachmentError::Validation(failure.into()))
    }

    /// Move a pending record to `to`. On a lost race, return whatever state
    /// the winner left, rejecting anything that is not `ACTIVE`.
    async fn settle(
        &self,
        record: &AttachmentRecord,
        to: AttachmentState,
    ) -> Result<AttachmentRecord, AttachmentError> {
        match self
            .db
            .transition_attachment_state(&record.id, AttachmentState::Pending, to, Utc::now())
            .await
        {
            Ok(updated) => Ok(updated),
            Err(DbError::Conflict(msg)) => {
                let current = self.db.get_attachment(&record.id).await?;
                match current.state {
                    AttachmentState::Active => Ok(current),
                    AttachmentState::Failed if to == AttachmentState::Failed => Ok(current),
                    _ => {
                        warn!(attachment_id = %record.id, %msg, "confirmation lost a race");
                        Err(AttachmentError::Validation(MSG_FAILED.into()))
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
