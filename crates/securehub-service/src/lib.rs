mod cascade;
mod config;
mod confirm;
mod download;
mod error;
mod limits;
mod reaper;
mod retry;
pub mod sanitize;
mod service;
mod upload;

pub use cascade::DeletionCascade;
pub use config::{AttachmentConfig, DEFAULT_ALLOWED_MIME_TYPES};
pub use confirm::ConfirmationVerifier;
pub use download::{DownloadLink, DownloadUrlIssuer};
pub use error::AttachmentError;
pub use limits::{LimitEnforcer, ParentGuard};
pub use reaper::{OrphanReaper, ReapReport};
pub use retry::delete_with_retry;
pub use service::AttachmentService;
pub use upload::{UploadRequest, UploadSlot, UploadUrlIssuer};
