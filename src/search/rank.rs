//! Recency ordering of fetched messages.

use std::cmp::Reverse;

use crate::model::message::Message;

/// Order messages newest first by server timestamp and keep the first `limit`.
///
/// The sort is stable: messages with equal timestamps keep their fetch order.
pub fn rank_by_recency(mut messages: Vec<Message>, limit: usize) -> Vec<Message> {
    messages.sort_by_key(|m| Reverse(m.internal_date));
    messages.truncate(limit);
    messages
}
