use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use securehub_core::attachment::AttachmentParent;
use tracing::warn;

use crate::sanitize::normalize_content_type;

pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
];

/// Limits and timings for the attachment lifecycle.
#[derive(Debug, Clone)]
pub struct AttachmentConfig {
    pub max_file_size_bytes: i64,
    pub request_max_count: u32,
    pub comment_max_count: u32,
    pub upload_url_ttl: Duration,
    pub download_url_ttl: Duration,
    /// Pending records older than this are reclaimed by the reaper.
    pub max_pending_age: Duration,
    pub reaper_interval: Duration,
    /// Total attempts per object delete, including the first.
    pub delete_retry_attempts: u32,
    /// Wait before the first retry; doubles on each further retry.
    pub delete_retry_backoff: Duration,
    pub max_file_name_length: usize,
    allowed_mime_types: BTreeSet<String>,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            request_max_count: 10,
            comment_max_count: 5,
            upload_url_ttl: Duration::from_secs(5 * 60),
            download_url_ttl: Duration::from_secs(5 * 60),
            max_pending_age: Duration::from_secs(24 * 60 * 60),
            reaper_interval: Duration::from_secs(15 * 60),
            delete_retry_attempts: 3,
            delete_retry_backoff: Duration::from_millis(100),
            max_file_name_length: 120,
            allowed_mime_types: normalize_all(DEFAULT_ALLOWED_MIME_TYPES.iter().copied()),
        }
    }
}

fn normalize_all<'a>(types: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    types
        .into_iter()
        .map(normalize_content_type)
        .filter(|t| !t.is_empty())
        .collect()
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

impl AttachmentConfig {
    /// Defaults overridden by `SECUREHUB_ATTACHMENT_*` variables.
    /// Durations are given in seconds, except the retry backoff in milliseconds.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_MAX_FILE_SIZE_BYTES") {
            config.max_file_size_bytes = v;
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_REQUEST_MAX_COUNT") {
            config.request_max_count = v;
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_COMMENT_MAX_COUNT") {
            config.comment_max_count = v;
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_UPLOAD_URL_TTL_SECS") {
            config.upload_url_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_DOWNLOAD_URL_TTL_SECS") {
            config.download_url_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_MAX_PENDING_AGE_SECS") {
            config.max_pending_age = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_REAPER_INTERVAL_SECS") {
            config.reaper_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_DELETE_RETRY_ATTEMPTS") {
            config.delete_retry_attempts = v;
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_DELETE_RETRY_BACKOFF_MS") {
            config.delete_retry_backoff = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("SECUREHUB_ATTACHMENT_MAX_FILE_NAME_LENGTH") {
            config.max_file_name_length = v;
        }
        if let Ok(list) = std::env::var("SECUREHUB_ATTACHMENT_ALLOWED_MIME_TYPES") {
            config = config.with_allowed_mime_types(list.split(','));
        }
        config
    }

    /// Replace the allow-set. Entries are normalized like incoming content types.
    pub fn with_allowed_mime_types<'a>(mut self, types: impl IntoIterator<Item = &'a str>) -> Self {
        self.allowed_mime_types = normalize_all(types);
        self
    }

    pub fn allowed_mime_types(&self) -> impl Iterator<Item = &str> {
        self.allowed_mime_types.iter().map(String::as_str)
    }

    /// `content_type` must already be normalized.
    pub fn is_allowed(&self, content_type: &str) -> bool {
        self.allowed_mime_types.contains(content_type)
    }

    pub fn max_count_for(&self, parent: &AttachmentParent) -> u32 {
        match parent {
            AttachmentParent::Request { .. } => self.request_max_count,
            AttachmentParent::Comment { .. } => self.comment_max_count,
        }
    }

    /// The reaper cutoff: pending records created before this are stale.
    pub fn pending_cutoff(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
        chrono::Duration::from_std(self.max_pending_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
    }
}
