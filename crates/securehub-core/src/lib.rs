pub mod attachment;

pub use attachment::{AttachmentParent, AttachmentRecord, AttachmentState, NewAttachment};
