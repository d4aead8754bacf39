use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an attachment record.
///
/// `Pending` is the only non-terminal state; a record leaves it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentState {
    Pending,
    Active,
    Failed,
}

impl AttachmentState {
    pub const ALL: &[AttachmentState] = &[
        AttachmentState::Pending,
        AttachmentState::Active,
        AttachmentState::Failed,
    ];

    /// States that occupy a slot in the parent's attachment quota.
    pub const QUOTA_STATES: &[AttachmentState] =
        &[AttachmentState::Pending, AttachmentState::Active];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentState::Pending => "PENDING",
            AttachmentState::Active => "ACTIVE",
            AttachmentState::Failed => "FAILED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AttachmentState::Pending => "Pending",
            AttachmentState::Active => "Active",
            AttachmentState::Failed => "Failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AttachmentState::Pending),
            "ACTIVE" => Some(AttachmentState::Active),
            "FAILED" => Some(AttachmentState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttachmentState::Pending)
    }

    pub fn counts_toward_quota(&self) -> bool {
        Self::QUOTA_STATES.contains(self)
    }

    pub fn can_transition_to(&self, next: AttachmentState) -> bool {
        matches!(
            (self, next),
            (AttachmentState::Pending, AttachmentState::Active)
                | (AttachmentState::Pending, AttachmentState::Failed)
        )
    }
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The single owner of an attachment.
///
/// A comment parent carries the id of the request it belongs to; object keys
/// and request-wide cascades both need it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachmentParent {
    Request {
        request_id: String,
    },
    Comment {
        request_id: String,
        comment_id: String,
    },
}

impl AttachmentParent {
    pub fn request(request_id: impl Into<String>) -> Self {
        AttachmentParent::Request {
            request_id: request_id.into(),
        }
    }

    pub fn comment(request_id: impl Into<String>, comment_id: impl Into<String>) -> Self {
        AttachmentParent::Comment {
            request_id: request_id.into(),
            comment_id: comment_id.into(),
        }
    }

    /// Rebuild a parent from its storage columns. A non-null `comment_id`
    /// means the comment owns the record.
    pub fn from_columns(request_id: String, comment_id: Option<String>) -> Self {
        match comment_id {
            Some(comment_id) => AttachmentParent::Comment {
                request_id,
                comment_id,
            },
            None => AttachmentParent::Request { request_id },
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            AttachmentParent::Request { request_id } => request_id,
            AttachmentParent::Comment { request_id, .. } => request_id,
        }
    }

    pub fn comment_id(&self) -> Option<&str> {
        match self {
            AttachmentParent::Request { .. } => None,
            AttachmentParent::Comment { comment_id, .. } => Some(comment_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttachmentParent::Request { .. } => "request",
            AttachmentParent::Comment { .. } => "comment",
        }
    }
}

impl fmt::Display for AttachmentParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentParent::Request { request_id } => write!(f, "request {request_id}"),
            AttachmentParent::Comment {
                request_id,
                comment_id,
            } => write!(f, "comment {comment_id} (request {request_id})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: String,
    pub parent: AttachmentParent,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub object_key: String,
    pub state: AttachmentState,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a record. New records always start out `Pending`;
/// `object_key` is normally a placeholder until the id is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttachment {
    pub parent: AttachmentParent,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub object_key: String,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

/// A unique stand-in key for the window between insert and final key assignment.
pub fn placeholder_object_key() -> String {
    format!("pending/{}", uuid::Uuid::new_v4())
}
