pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use securehub_core::attachment::{AttachmentParent, AttachmentRecord, AttachmentState, NewAttachment};

use crate::{Database, DbConfig, DbError};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("securehub.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            migrations::run(conn)?;
            Ok(())
        })
    }
}

/// Map a `rusqlite::Error` into a `DbError::Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

fn join_err(e: tokio::task::JoinError) -> DbError {
    DbError::Internal(e.to_string())
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn create_attachment(&self, input: &NewAttachment) -> Result<AttachmentRecord, DbError> {
        let db = self.clone();
        let input = input.clone();
        tokio::task::spawn_blocking(move || db.create_attachment_sync(&input))
            .await
            .map_err(join_err)?
    }

    async fn get_attachment(&self, id: &str) -> Result<AttachmentRecord, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.get_attachment_sync(&id))
            .await
            .map_err(join_err)?
    }

    async fn list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        let db = self.clone();
        let parent = parent.clone();
        tokio::task::spawn_blocking(move || db.list_attachments_sync(&parent))
            .await
            .map_err(join_err)?
    }

    async fn list_attachments_for_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        let db = self.clone();
        let request_id = request_id.to_string();
        tokio::task::spawn_blocking(move || db.list_attachments_for_request_sync(&request_id))
            .await
            .map_err(join_err)?
    }

    async fn find_attachments_in_state_before(
        &self,
        state: AttachmentState,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AttachmentRecord>, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            db.find_attachments_in_state_before_sync(state, older_than)
        })
        .await
        .map_err(join_err)?
    }

    async fn count_attachments_in_states(
        &self,
        parent: &AttachmentParent,
        states: &[AttachmentState],
    ) -> Result<i64, DbError> {
        let db = self.clone();
        let parent = parent.clone();
        let states = states.to_vec();
        tokio::task::spawn_blocking(move || db.count_attachments_in_states_sync(&parent, &states))
            .await
            .map_err(join_err)?
    }

    async fn set_object_key(
        &self,
        id: &str,
        object_key: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError> {
        let db = self.clone();
        let id = id.to_string();
        let object_key = object_key.to_string();
        tokio::task::spawn_blocking(move || db.set_object_key_sync(&id, &object_key, updated_at))
            .await
            .map_err(join_err)?
    }

    async fn transition_attachment_state(
        &self,
        id: &str,
        from: AttachmentState,
        to: AttachmentState,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            db.transition_attachment_state_sync(&id, from, to, updated_at)
        })
        .await
        .map_err(join_err)?
    }

    async fn delete_attachment(&self, id: &str) -> Result<AttachmentRecord, DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.delete_attachment_sync(&id))
            .await
            .map_err(join_err)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_returns_working_db() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE name = 'attachments'",
                    [],
                    |row| row.get(0),
                )
                .to_db()?;
            assert_eq!(count, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn open_path_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("test.db");
        assert!(!db_path.exists());

        let _db = SqliteDatabase::open_path(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn reopening_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("twice.db");
        drop(SqliteDatabase::open_path(&db_path).unwrap());
        let db = SqliteDatabase::open_path(&db_path).unwrap();
        db.with_conn(|conn| {
            let version: i64 = conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
                .to_db()?;
            assert_eq!(version, migrations::LATEST_VERSION);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn newer_schema_still_opens() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("newer.db");
        let db = SqliteDatabase::open_path(&db_path).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
                [migrations::LATEST_VERSION + 1],
            )
            .to_db()?;
            Ok(())
        })
        .unwrap();
        drop(db);

        let db = SqliteDatabase::open_path(&db_path).unwrap();
        db.with_conn(|conn| {
            let version: i64 = conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
                .to_db()?;
            assert_eq!(version, migrations::LATEST_VERSION + 1);
            Ok(())
        })
        .unwrap();
    }
}
