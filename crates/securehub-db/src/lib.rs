#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use securehub_core::attachment::{AttachmentParent, AttachmentRecord, AttachmentState, NewAttachment};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional write did not apply because the row changed underneath it.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// Persistence for attachment metadata.
///
/// Backends never assign timestamps on their own: `created_at` comes in on
/// [`NewAttachment`] and every mutation takes its `updated_at`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Insert a new `PENDING` record and return it with its assigned id.
    async fn create_attachment(&self, input: &NewAttachment) -> Result<AttachmentRecord, DbError>;

    async fn get_attachment(&self, id: &str) -> Result<AttachmentRecord, DbError>;

    /// Attachments owned directly by `parent`, oldest first.
    async fn list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, DbError>;

    /// Every attachment under a request, including those owned by its comments.
    async fn list_attachments_for_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<AttachmentRecord>, DbError>;

    /// Records in `state` whose `created_at` is strictly before `older_than`.
    async fn find_attachments_in_state_before(
        &self,
        state: AttachmentState,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AttachmentRecord>, DbError>;

    async fn count_attachments_in_states(
        &self,
        parent: &AttachmentParent,
        states: &[AttachmentState],
    ) -> Result<i64, DbError>;

    async fn set_object_key(
        &self,
        id: &str,
        object_key: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError>;

    /// Move a record from `from` to `to`, only if it is still in `from`.
    ///
    /// Returns `DbError::Conflict` for an illegal transition or when the
    /// stored state no longer matches `from`.
    async fn transition_attachment_state(
        &self,
        id: &str,
        from: AttachmentState,
        to: AttachmentState,
        updated_at: DateTime<Utc>,
    ) -> Result<AttachmentRecord, DbError>;

    /// Delete a record, returning what was deleted.
    async fn delete_attachment(&self, id: &str) -> Result<AttachmentRecord, DbError>;
}

/// Which backend to open.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Postgres connection string. When set, it wins over SQLite.
    pub database_url: Option<String>,
    /// SQLite file path. Defaults to `<data_dir>/securehub.db`.
    pub sqlite_path: Option<String>,
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("SECUREHUB_DATABASE_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .ok(),
            sqlite_path: std::env::var("SECUREHUB_SQLITE_PATH").ok(),
        }
    }

    pub fn is_postgres(&self) -> bool {
        self.database_url.is_some()
    }
}

/// Open the configured backend and run its migrations.
pub async fn open_database(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    if let Some(url) = config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        {
            return Ok(Arc::new(PostgresDatabase::connect(url).await?));
        }
        #[cfg(not(feature = "postgres"))]
        {
            let _ = url;
            return Err(DbError::Internal(
                "database url configured but the 'postgres' feature is not enabled".into(),
            ));
        }
    }

    #[cfg(feature = "sqlite")]
    {
        Ok(Arc::new(SqliteDatabase::open(config)?))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Err(DbError::Internal(
            "no database url configured and the 'sqlite' feature is not enabled".into(),
        ))
    }
}

/// Default data directory: `$XDG_DATA_HOME/securehub` or `~/.local/share/securehub`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("securehub")
}

/// Shared guard for conditional state updates.
pub(crate) fn check_transition(
    id: &str,
    from: AttachmentState,
    to: AttachmentState,
) -> Result<(), DbError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(DbError::Conflict(format!(
            "attachment {id}: illegal transition {} -> {}",
            from.as_str(),
            to.as_str()
        )))
    }
}
