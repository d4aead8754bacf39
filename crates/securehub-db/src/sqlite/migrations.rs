use rusqlite::Connection;
use tracing::{info, warn};

use super::SqliteResultExt;
use crate::DbError;

pub(crate) const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if current_version > LATEST_VERSION {
        warn!(
            current_version,
            latest = LATEST_VERSION,
            "sqlite schema is newer than this build"
        );
    }

    if current_version < 1 {
        info!("applying sqlite migration v1 (attachments)");
        // v1: attachment metadata. request_id is always set; a non-null
        // comment_id means the comment owns the row.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS attachments (
                 id            TEXT PRIMARY KEY,
                 request_id    TEXT NOT NULL,
                 comment_id    TEXT,
                 file_name     TEXT NOT NULL,
                 content_type  TEXT NOT NULL,
                 file_size     INTEGER NOT NULL CHECK(file_size > 0),
                 object_key    TEXT NOT NULL UNIQUE,
                 state         TEXT NOT NULL DEFAULT 'PENDING'
                                   CHECK(state IN ('PENDING', 'ACTIVE', 'FAILED')),
                 uploaded_by   TEXT NOT NULL,
                 created_at    TEXT NOT NULL,
                 updated_at    TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_attachments_request
                 ON attachments(request_id, created_at);
             CREATE INDEX IF NOT EXISTS idx_attachments_comment
                 ON attachments(comment_id, created_at);
             CREATE INDEX IF NOT EXISTS idx_attachments_state
                 ON attachments(state, created_at);",
        )
        .to_db()?;

        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'))",
            [],
        )
        .to_db()?;
    }

    Ok(())
}
