//! Fetched messages and their body-part trees.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};

/// Opaque message identifier, unique within one account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single `name: value` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Look up a header by name, ignoring ASCII case. The first match wins.
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// One node of a message's body tree.
///
/// A part may carry inline content, reference a separately fetchable
/// attachment, contain child parts, or any combination of these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    /// Position in the tree as reported by the server (`"0"`, `"1.2"`, ...).
    pub part_id: String,

    /// MIME type, e.g. `"multipart/mixed"` or `"application/pdf"`.
    pub mime_type: String,

    /// Filename from the part headers. Empty for body text and containers.
    pub filename: String,

    /// Server handle for fetching the payload separately.
    pub attachment_id: Option<String>,

    /// Declared body size in bytes.
    pub size: u64,

    pub headers: Vec<Header>,

    /// Children in server order.
    pub parts: Vec<Part>,
}

impl Part {
    /// A part is an attachment when it has both a filename and an attachment id.
    pub fn is_attachment(&self) -> bool {
        !self.filename.is_empty() && self.attachment_id.is_some()
    }
}

/// A fully fetched message.
///
/// Immutable once fetched and never persisted; it is dropped after its
/// attachments have been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,

    /// Server receipt timestamp in milliseconds since the Unix epoch.
    /// Monotonic per account, but not unique.
    pub internal_date: i64,

    /// Top-level headers.
    pub headers: Vec<Header>,

    /// Root of the body tree.
    pub payload: Part,
}

impl Message {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or("(no subject)")
    }

    /// `internal_date` as a UTC timestamp, for display.
    pub fn received_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.internal_date)
            .single()
            .unwrap_or_default()
    }
}
