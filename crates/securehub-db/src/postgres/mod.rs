pub(crate) mod migrations;
pub mod queries;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use securehub_core::attachment::{AttachmentParent, AttachmentRecord, AttachmentState, NewAttachment};

use crate::{Database, DbError};

/// Map a sqlx::Error into a DbError::Internal.
pub(crate) fn pg_err(e: sqlx::Error) -> DbError {
    DbError::Internal(e.to_string())
}

/// Create a DbError::NotFound with the given entity description.
pub(crate) fn pg_not_found(entity: &str) -> DbError {
    DbError::NotFound(entity.to_string())
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pub(crate) pool: PgPool,
}

impl PostgresDatabase {
    /// Connect to a Postgres database and run migrations.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(pg_err)?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        Ok(db)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn create_attachment(&self, input: &NewAttachment) -> Result<AttachmentRecord, DbError> {
        self.pg_create_attachment(input).await
    }
    async fn get_attachment(&self, id: &str) -> Result<AttachmentRecord, DbError> {
        self.pg_get_attachment(id).await
    }
    async fn list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        self.pg_list_attachments(parent).await
    }
    async fn list_attachments_for_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        self.pg_list_attachments_for_request(request_id).await
    }
    async fn find_attachments_in_state_before(
        &self,
        state: AttachmentState,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        self.pg_find_attachments_in_state_before(state, older_than)
            .await
    }
    async fn count_attachments_in_states(
        &self,
        parent: &AttachmentParent,
        states: &[AttachmentState],
    ) -> Result<i64, DbError> {
        self.pg_count_attachments_in_states(parent, states).await
    }
    async fn set_object_key(
        &self,
        id: &str,
        object_key: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError> {
        self.pg_set_object_key(id, object_key, updated_at).await
    }
    async fn transition_attachment_state(
        &self,
        id: &str,
        from: AttachmentState,
        to: AttachmentState,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError> {
        self.pg_transition_attachment_state(id, from, to, updated_at)
            .await
    }
    async fn delete_attachment(&self, id: &str) -> Result<AttachmentRecord, DbError> {
        self.pg_delete_attachment(id).await
    }
}
