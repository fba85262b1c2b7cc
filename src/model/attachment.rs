//! Attachment descriptors and payloads.
//!
//! The binary payload is NOT part of a fetched message.
//! It is requested separately, on demand, for each descriptor.

use std::path::PathBuf;

use super::message::{MessageId, Part};

/// A part of a message that names a separately fetchable binary payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentDescriptor {
    /// Message the attachment belongs to.
    pub message_id: MessageId,

    /// Server handle used to fetch the payload.
    pub attachment_id: String,

    /// Original filename. Not unique within or across messages.
    pub filename: String,

    /// MIME type (e.g. `"text/plain"`, `"application/zip"`).
    pub mime_type: String,

    /// Size declared by the server, in bytes.
    pub size: u64,

    /// Position of the part in the message tree.
    pub part_id: String,
}

impl AttachmentDescriptor {
    /// Build a descriptor from a qualifying part. Returns `None` for inert parts.
    pub fn from_part(message_id: &MessageId, part: &Part) -> Option<Self> {
        if !part.is_attachment() {
            return None;
        }
        Some(Self {
            message_id: message_id.clone(),
            attachment_id: part.attachment_id.clone()?,
            filename: part.filename.clone(),
            mime_type: part.mime_type.clone(),
            size: part.size,
            part_id: part.part_id.clone(),
        })
    }
}

/// Attachment payload exactly as returned by the API (base64url text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBytes(pub String);

impl EncodedBytes {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An attachment written to disk.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SavedAttachment {
    pub message_id: MessageId,
    pub filename: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// An attachment that could not be fetched, decoded or written.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SkippedAttachment {
    pub message_id: MessageId,
    pub filename: String,
    pub reason: String,
}
