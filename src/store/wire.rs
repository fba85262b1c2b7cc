//! JSON shapes of the Gmail REST API and their conversion into the model.

use serde::Deserialize;
use tracing::warn;

use crate::error::{GrabError, Result};
use crate::model::attachment::EncodedBytes;
use crate::model::message::{Header, Message, MessageId, Part};

/// `GET users/{user}/messages`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// `GET users/{user}/messages/{id}?format=full`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: String,
    /// Milliseconds since the epoch, sent as a decimal string.
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<WirePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(default)]
    pub part_id: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<WireHeader>,
    #[serde(default)]
    pub body: Option<WireBody>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
pub struct WireHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBody {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// `GET users/{user}/messages/{id}/attachments/{attachmentId}`
#[derive(Debug, Deserialize)]
pub struct WireAttachment {
    pub data: String,
}

impl From<WireHeader> for Header {
    fn from(h: WireHeader) -> Self {
        Header::new(h.name, h.value)
    }
}

impl From<WirePart> for Part {
    fn from(w: WirePart) -> Self {
        let body = w.body.unwrap_or_default();
        Part {
            part_id: w.part_id,
            mime_type: w.mime_type,
            filename: w.filename,
            attachment_id: body.attachment_id,
            size: body.size,
            headers: w.headers.into_iter().map(Header::from).collect(),
            parts: w.parts.into_iter().map(Part::from).collect(),
        }
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = GrabError;

    fn try_from(w: WireMessage) -> Result<Self> {
        let internal_date = match w.internal_date {
            Some(raw_date) => raw_date.trim().parse::<i64>().map_err(|e| {
                GrabError::InvalidResponse(format!(
                    "message {} has non-numeric internalDate '{raw_date}': {e}",
                    w.id
                ))
            })?,
            None => {
                warn!(message_id = %w.id, "Message has no internalDate, ranking it oldest");
                0
            }
        };

        let payload: Part = w.payload.map(Part::from).unwrap_or_default();
        Ok(Message {
            id: MessageId(w.id),
            internal_date,
            headers: payload.headers.clone(),
            payload,
        })
    }
}

impl From<WireAttachment> for EncodedBytes {
    fn from(w: WireAttachment) -> Self {
        EncodedBytes(w.data)
    }
}
