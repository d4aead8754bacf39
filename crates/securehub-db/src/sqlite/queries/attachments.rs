use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use securehub_core::attachment::{AttachmentParent, AttachmentRecord, AttachmentState, NewAttachment};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::{check_transition, DbError};

fn row_to_attachment(row: &Row) -> rusqlite::Result<AttachmentRecord> {
    let state_str: String = row.get("state")?;
    let state = AttachmentState::parse_str(&state_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("unknown attachment state {state_str:?}").into(),
        )
    })?;
    Ok(AttachmentRecord {
        id: row.get("id")?,
        parent: AttachmentParent::from_columns(row.get("request_id")?, row.get("comment_id")?),
        file_name: row.get("file_name")?,
        content_type: row.get("content_type")?,
        file_size: row.get("file_size")?,
        object_key: row.get("object_key")?,
        state,
        uploaded_by: row.get("uploaded_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// `'PENDING', 'ACTIVE'` style list. The values are fixed enum strings, never user input.
fn state_list(states: &[AttachmentState]) -> String {
    states
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fetch(conn: &Connection, id: &str) -> Result<AttachmentRecord, DbError> {
    conn.query_row(
        "SELECT * FROM attachments WHERE id = ?1",
        params![id],
        row_to_attachment,
    )
    .optional()
    .to_db()?
    .ok_or_else(|| DbError::NotFound(format!("attachment {id}")))
}

fn query_list(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<AttachmentRecord>, DbError> {
    let mut stmt = conn.prepare(sql).to_db()?;
    let rows = stmt
        .query_map(args, row_to_attachment)
        .to_db()?
        .collect::<Result<Vec<_>, _>>()
        .to_db()?;
    Ok(rows)
}

impl SqliteDatabase {
    pub fn create_attachment_sync(
        &self,
        input: &NewAttachment,
    ) -> Result<AttachmentRecord, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO attachments (
                     id, request_id, comment_id, file_name, content_type, file_size,
                     object_key, state, uploaded_by, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'PENDING', ?8, ?9, ?9)",
                params![
                    id,
                    input.parent.request_id(),
                    input.parent.comment_id(),
                    input.file_name,
                    input.content_type,
                    input.file_size,
                    input.object_key,
                    input.uploaded_by,
                    input.created_at,
                ],
            )
            .to_db()?;
            fetch(conn, &id)
        })
    }

    pub fn get_attachment_sync(&self, id: &str) -> Result<AttachmentRecord, DbError> {
        self.with_conn(|conn| fetch(conn, id))
    }

    pub fn list_attachments_sync(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        self.with_conn(|conn| match parent {
            AttachmentParent::Request { request_id } => query_list(
                conn,
                "SELECT * FROM attachments
                 WHERE request_id = ?1 AND comment_id IS NULL
                 ORDER BY created_at ASC, rowid ASC",
                &[request_id],
            ),
            AttachmentParent::Comment {
                request_id,
                comment_id,
            } => query_list(
                conn,
                "SELECT * FROM attachments
                 WHERE request_id = ?1 AND comment_id = ?2
                 ORDER BY created_at ASC, rowid ASC",
                &[request_id, comment_id],
            ),
        })
    }

    pub fn list_attachments_for_request_sync(
        &self,
        request_id: &str,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        self.with_conn(|conn| {
            query_list(
                conn,
                "SELECT * FROM attachments WHERE request_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
                &[&request_id],
            )
        })
    }

    pub fn find_attachments_in_state_before_sync(
        &self,
        state: AttachmentState,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        self.with_conn(|conn| {
            query_list(
                conn,
                "SELECT * FROM attachments WHERE state = ?1 AND created_at < ?2
                 ORDER BY created_at ASC",
                &[&state.as_str(), &older_than],
            )
        })
    }

    pub fn count_attachments_in_states_sync(
        &self,
        parent: &AttachmentParent,
        states: &[AttachmentState],
    ) -> Result<i64, DbError> {
        if states.is_empty() {
            return Ok(0);
        }
        let in_list = state_list(states);
        self.with_conn(|conn| {
            let count = match parent {
                AttachmentParent::Request { request_id } => conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM attachments
                         WHERE request_id = ?1 AND comment_id IS NULL AND state IN ({in_list})"
                    ),
                    params![request_id],
                    |r| r.get(0),
                ),
                AttachmentParent::Comment {
                    request_id,
                    comment_id,
                } => conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM attachments
                         WHERE request_id = ?1 AND comment_id = ?2 AND state IN ({in_list})"
                    ),
                    params![request_id, comment_id],
                    |r| r.get(0),
                ),
            };
            count.to_db()
        })
    }

    pub fn set_object_key_sync(
        &self,
        id: &str,
        object_key: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError> {
        self.with_conn(|conn| {
            let affected = conn
                .execute(
                    "UPDATE attachments SET object_key = ?1, updated_at = ?2 WHERE id = ?3",
                    params![object_key, updated_at, id],
                )
                .to_db()?;
            if affected == 0 {
                return Err(DbError::NotFound(format!("attachment {id}")));
            }
            fetch(conn, id)
        })
    }

    pub fn transition_attachment_state_sync(
        &self,
        id: &str,
        from: AttachmentState,
        to: AttachmentState,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError> {
        check_transition(id, from, to)?;
        self.with_conn(|conn| {
            let affected = conn
                .execute(
                    "UPDATE attachments SET state = ?1, updated_at = ?2
                     WHERE id = ?3 AND state = ?4",
                    params![to.as_str(), updated_at, id, from.as_str()],
                )
                .to_db()?;
            if affected == 0 {
                // Either the row is gone or someone else already moved it.
                let current = fetch(conn, id)?;
                return Err(DbError::Conflict(format!(
                    "attachment {id} is {}, expected {}",
                    current.state.as_str(),
                    from.as_str()
                )));
            }
            fetch(conn, id)
        })
    }

    pub fn delete_attachment_sync(&self, id: &str) -> Result<AttachmentRecord, DbError> {
        self.with_conn(|conn| {
            let attachment = fetch(conn, id)?;
            conn.execute("DELETE FROM attachments WHERE id = ?1", params![id])
                .to_db()?;
            Ok(attachment)
        })
    }
}
