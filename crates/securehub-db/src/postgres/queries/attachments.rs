use chrono::{DateTime, Utc};

use securehub_core::attachment::{AttachmentParent, AttachmentRecord, AttachmentState, NewAttachment};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::{check_transition, DbError};

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: String,
    request_id: String,
    comment_id: Option<String>,
    file_name: String,
    content_type: String,
    file_size: i64,
    object_key: String,
    state: String,
    uploaded_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttachmentRow> for AttachmentRecord {
    type Error = DbError;

    fn try_from(r: AttachmentRow) -> Result<Self, Self::Error> {
        let state = AttachmentState::parse_str(&r.state).ok_or_else(|| {
            DbError::Internal(format!("attachment {}: unknown state {:?}", r.id, r.state))
        })?;
        Ok(AttachmentRecord {
            id: r.id,
            parent: AttachmentParent::from_columns(r.request_id, r.comment_id),
            file_name: r.file_name,
            content_type: r.content_type,
            file_size: r.file_size,
            object_key: r.object_key,
            state,
            uploaded_by: r.uploaded_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn into_records(rows: Vec<AttachmentRow>) -> Result<Vec<AttachmentRecord>, DbError> {
    rows.into_iter().map(AttachmentRecord::try_from).collect()
}

impl PostgresDatabase {
    pub(crate) async fn pg_create_attachment(
        &self,
        input: &NewAttachment,
    ) -> Result<AttachmentRecord, DbError> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO attachments (
                 id, request_id, comment_id, file_name, content_type, file_size,
                 object_key, state, uploaded_by, created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', $8, $9, $9)",
        )
        .bind(&id)
        .bind(input.parent.request_id())
        .bind(input.parent.comment_id())
        .bind(&input.file_name)
        .bind(&input.content_type)
        .bind(input.file_size)
        .bind(&input.object_key)
        .bind(&input.uploaded_by)
        .bind(input.created_at)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;

        self.pg_get_attachment(&id).await
    }

    pub(crate) async fn pg_get_attachment(&self, id: &str) -> Result<AttachmentRecord, DbError> {
        sqlx::query_as::<_, AttachmentRow>("SELECT * FROM attachments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?
            .ok_or_else(|| pg_not_found(&format!("attachment {id}")))?
            .try_into()
    }

    pub(crate) async fn pg_list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        let rows = match parent {
            AttachmentParent::Request { request_id } => {
                sqlx::query_as::<_, AttachmentRow>(
                    "SELECT * FROM attachments
                     WHERE request_id = $1 AND comment_id IS NULL
                     ORDER BY created_at ASC, id ASC",
                )
                .bind(request_id)
                .fetch_all(&self.pool)
                .await
            }
            AttachmentParent::Comment {
                request_id,
                comment_id,
            } => {
                sqlx::query_as::<_, AttachmentRow>(
                    "SELECT * FROM attachments
                     WHERE request_id = $1 AND comment_id = $2
                     ORDER BY created_at ASC, id ASC",
                )
                .bind(request_id)
                .bind(comment_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(pg_err)?;

        into_records(rows)
    }

    pub(crate) async fn pg_list_attachments_for_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM attachments WHERE request_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        into_records(rows)
    }

    pub(crate) async fn pg_find_attachments_in_state_before(
        &self,
        state: AttachmentState,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM attachments WHERE state = $1 AND created_at < $2
             ORDER BY created_at ASC",
        )
        .bind(state.as_str())
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        into_records(rows)
    }

    pub(crate) async fn pg_count_attachments_in_states(
        &self,
        parent: &AttachmentParent,
        states: &[AttachmentState],
    ) -> Result<i64, DbError> {
        let states: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();
        match parent {
            AttachmentParent::Request { request_id } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM attachments
                     WHERE request_id = $1 AND comment_id IS NULL AND state = ANY($2)",
                )
                .bind(request_id)
                .bind(&states)
                .fetch_one(&self.pool)
                .await
            }
            AttachmentParent::Comment {
                request_id,
                comment_id,
            } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM attachments
                     WHERE request_id = $1 AND comment_id = $2 AND state = ANY($3)",
                )
                .bind(request_id)
                .bind(comment_id)
                .bind(&states)
                .fetch_one(&self.pool)
                .await
            }
        }
        .map_err(pg_err)
    }

    pub(crate) async fn pg_set_object_key(
        &self,
        id: &str,
        object_key: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError> {
        let result =
            sqlx::query("UPDATE attachments SET object_key = $1, updated_at = $2 WHERE id = $3")
                .bind(object_key)
                .bind(updated_at)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(pg_err)?;

        if result.rows_affected() == 0 {
            return Err(pg_not_found(&format!("attachment {id}")));
        }
        self.pg_get_attachment(id).await
    }

    pub(crate) async fn pg_transition_attachment_state(
        &self,
        id: &str,
        from: AttachmentState,
        to: AttachmentState,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError> {
        check_transition(id, from, to)?;

        let row = sqlx::query_as::<_, AttachmentRow>(
            "UPDATE attachments SET state = $1, updated_at = $2
             WHERE id = $3 AND state = $4
             RETURNING *",
        )
        .bind(to.as_str())
        .bind(updated_at)
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = self.pg_get_attachment(id).await?;
                Err(DbError::Conflict(format!(
                    "attachment {id} is {}, expected {}",
                    current.state.as_str(),
                    from.as_str()
                )))
            }
        }
    }

    pub(crate) async fn pg_delete_attachment(&self, id: &str) -> Result<AttachmentRecord, DbError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            "DELETE FROM attachments WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?
        .ok_or_else(|| pg_not_found(&format!("attachment {id}")))?;

        row.try_into()
    }
}
