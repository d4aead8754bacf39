use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use securehub_core::attachment::{AttachmentParent, AttachmentState};
use securehub_db::Database;
use tokio::sync::OwnedMutexGuard;

use crate::{AttachmentConfig, AttachmentError};

/// Held while a parent's quota is checked and its new record inserted.
pub type ParentGuard = OwnedMutexGuard<()>;

/// Per-parent attachment quota.
///
/// Only `PENDING` and `ACTIVE` records count. Callers take [`lock`](Self::lock)
/// before [`check`](Self::check) and keep the guard until the insert lands,
/// which makes the quota exact within this process.
pub struct LimitEnforcer {
    db: Arc<dyn Database>,
    config: Arc<AttachmentConfig>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

fn lock_key(parent: &AttachmentParent) -> String {
    match parent.comment_id() {
        Some(comment_id) => format!("comment:{}:{comment_id}", parent.request_id()),
        None => format!("request:{}", parent.request_id()),
    }
}

impl LimitEnforcer {
    pub fn new(db: Arc<dyn Database>, config: Arc<AttachmentConfig>) -> Self {
        Self {
            db,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lock(&self, parent: &AttachmentParent) -> ParentGuard {
        let slot = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries nobody holds or waits on are dropped.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            locks.entry(lock_key(parent)).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Reject if the parent already holds its maximum of live attachments.
    pub async fn check(&self, parent: &AttachmentParent) -> Result<(), AttachmentError> {
        let limit = self.config.max_count_for(parent);
        let current = self
            .db
            .count_attachments_in_states(parent, AttachmentState::QUOTA_STATES)
            .await?;
        if current >= i64::from(limit) {
            tracing::info!(%parent, current, limit, "attachment limit reached");
            return Err(AttachmentError::LimitExceeded {
                parent: parent.clone(),
                limit,
            });
        }
        Ok(())
    }

    #[cfg(test)]
    fn tracked_parents(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
