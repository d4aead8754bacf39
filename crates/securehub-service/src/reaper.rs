use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use securehub_core::attachment::AttachmentState;
use securehub_db::{Database, DbError};
use securehub_store::ObjectStoreGateway;

use crate::retry::delete_with_retry;
use crate::{AttachmentConfig, AttachmentError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub examined: usize,
    pub reclaimed: usize,
    pub failed: usize,
    /// Records confirmed or otherwise settled between selection and claim.
    pub skipped: usize,
}

/// Background task that reclaims abandoned uploads.
///
/// A record still `PENDING` after `max_pending_age` never had its upload
/// confirmed. It is first claimed with a conditional `PENDING -> FAILED`
/// update, so a confirmation that lands mid-sweep either wins (and the
/// record is skipped) or is rejected. Only then are its object and row
/// deleted. `FAILED` records past the same age are reclaimed too, which
/// also retries claims whose object delete failed on an earlier sweep.
pub struct OrphanReaper {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStoreGateway>,
    config: Arc<AttachmentConfig>,
}

impl OrphanReaper {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn ObjectStoreGateway>,
        config: Arc<AttachmentConfig>,
    ) -> Self {
        Self { db, store, config }
    }

    /// Sweep forever, once per `interval`. The first sweep runs immediately.
    pub async fn run(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep(Utc::now()).await {
                error!("reaper error: {e}");
            }
        }
    }

    /// One pass over pending and failed records created before `now - max_pending_age`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<ReapReport, AttachmentError> {
        let cutoff = self.config.pending_cutoff(now);
        let mut stale = self
            .db
            .find_attachments_in_state_before(AttachmentState::Pending, cutoff)
            .await?;
        stale.extend(
            self.db
                .find_attachments_in_state_before(AttachmentState::Failed, cutoff)
                .await?,
        );

        let mut report = ReapReport {
            examined: stale.len(),
            ..Default::default()
        };

        for record in stale {
            if record.state == AttachmentState::Pending {
                match self
                    .db
                    .transition_attachment_state(
                        &record.id,
                        AttachmentState::Pending,
                        AttachmentState::Failed,
                        now,
                    )
                    .await
                {
                    Ok(_) => {}
                    Err(DbError::Conflict(_) | DbError::NotFound(_)) => {
                        info!(attachment_id = %record.id, "reaper: record settled during sweep, skipping");
                        report.skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        error!(attachment_id = %record.id, error = %e, "reaper: claim failed");
                        report.failed += 1;
                        continue;
                    }
                }
            }

            if let Err(e) = delete_with_retry(
                &*self.store,
                &record.object_key,
                self.config.delete_retry_attempts,
                self.config.delete_retry_backoff,
            )
            .await
            {
                warn!(attachment_id = %record.id, error = %e, "reaper: object delete failed, keeping row");
                report.failed += 1;
                continue;
            }

            match self.db.delete_attachment(&record.id).await {
                Ok(_) | Err(DbError::NotFound(_)) => {
                    info!(
                        attachment_id = %record.id,
                        created_at = %record.created_at,
                        "reaper: reclaimed abandoned upload"
                    );
                    report.reclaimed += 1;
                }
                Err(e) => {
                    error!(attachment_id = %record.id, error = %e, "reaper: row delete failed");
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                reclaimed = report.reclaimed,
                failed = report.failed,
                skipped = report.skipped,
                "reaper sweep finished"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securehub_db::SqliteDatabase;
    use securehub_store::MockGateway;

    #[tokio::test]
    async fn sweep_empty_db() {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let mock = Arc::new(MockGateway::new());
        let reaper = OrphanReaper::new(db, mock.clone(), Arc::new(AttachmentConfig::default()));

        let report = reaper.sweep(Utc::now()).await.unwrap();
        assert_eq!(report, ReapReport::default());
        assert_eq!(mock.total_calls(), 0);
    }
}
