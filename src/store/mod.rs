//! Remote mailbox access: the [`MailApi`] boundary and its Gmail implementation.

pub mod gmail;
pub mod retry;
pub mod wire;

use crate::error::Result;
use crate::model::attachment::EncodedBytes;
use crate::model::message::{Message, MessageId};

/// The three calls the retrieval pipeline needs from a hosted mailbox.
///
/// Every call blocks until the server answers. Implementations report an
/// empty search as `Ok(vec![])`, never as an error.
pub trait MailApi {
    /// Run a search query and return up to `max_results` matching ids.
    fn search_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageId>>;

    /// Fetch a message with its headers, timestamp and full part tree.
    fn fetch_message(&self, id: &MessageId) -> Result<Message>;

    /// Fetch the transfer-encoded payload of one attachment.
    fn fetch_attachment(&self, message_id: &MessageId, attachment_id: &str)
        -> Result<EncodedBytes>;
}

impl<T: MailApi + ?Sized> MailApi for &T {
    fn search_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageId>> {
        (**self).search_messages(query, max_results)
    }

    fn fetch_message(&self, id: &MessageId) -> Result<Message> {
        (**self).fetch_message(id)
    }

    fn fetch_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<EncodedBytes> {
        (**self).fetch_attachment(message_id, attachment_id)
    }
}
