use securehub_core::attachment::AttachmentParent;
use securehub_db::DbError;
use securehub_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttachmentError {
    /// The caller's input or the record's state rules the operation out.
    #[error("invalid attachment: {0}")]
    Validation(String),

    #[error("attachment limit of {limit} reached for {parent}")]
    LimitExceeded { parent: AttachmentParent, limit: u32 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("database error: {0}")]
    Database(DbError),
}

impl AttachmentError {
    /// True for rejections the client caused and can act on.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AttachmentError::Validation(_) | AttachmentError::LimitExceeded { .. }
        )
    }
}

impl From<DbError> for AttachmentError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => AttachmentError::NotFound(msg),
            other => AttachmentError::Database(other),
        }
    }
}
