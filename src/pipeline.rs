//! End-to-end retrieval: search, fetch, rank, walk, persist.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::FetchConfig;
use crate::error::{GrabError, Result};
use crate::export::attachment::{AttachmentPersister, PersistReport};
use crate::model::message::{Message, MessageId};
use crate::parser::parts::collect_attachments;
use crate::search::{rank_by_recency, resolve, Resolution};
use crate::store::MailApi;

/// Summary of one processed message.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub subject: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
    pub attachments: usize,
}

/// A message whose attachments were not processed at all.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FailedMessage {
    pub id: MessageId,
    pub reason: String,
}

/// Everything a run did.
#[derive(Debug, Default, serde::Serialize)]
pub struct RunReport {
    /// The search pattern that produced the candidates, if any matched.
    pub matched_pattern: Option<String>,
    /// Patterns that came back empty before the match (or all of them).
    pub empty_patterns: Vec<String>,
    pub candidates: usize,
    pub messages: Vec<MessageSummary>,
    pub failed_messages: Vec<FailedMessage>,
    pub attachments: PersistReport,
    pub target_directory: PathBuf,
}

impl RunReport {
    pub fn no_match(&self) -> bool {
        self.matched_pattern.is_none()
    }
}

/// Run the whole retrieval against `api`.
///
/// Search and message-fetch failures abort the run, as does a target directory
/// that cannot be created. A message whose part tree
/// is too deep is recorded and skipped. Attachment failures are recorded in
/// the report.
pub fn run<A: MailApi>(
    api: &A,
    fetch: &FetchConfig,
    progress: &dyn Fn(usize, usize),
) -> Result<RunReport> {
    let target_directory = fetch.target_directory();
    let mut report = RunReport {
        target_directory: target_directory.clone(),
        ..RunReport::default()
    };

    let ids = match resolve(api, &fetch.search_patterns, fetch.max_results)? {
        Resolution::Matched { pattern, ids } => {
            report.empty_patterns = fetch
                .search_patterns
                .iter()
                .take_while(|p| **p != pattern)
                .cloned()
                .collect();
            report.matched_pattern = Some(pattern);
            ids
        }
        Resolution::NoMatch { tried } => {
            info!(patterns = tried.len(), "No messages found with any search pattern");
            report.empty_patterns = tried;
            return Ok(report);
        }
    };
    report.candidates = ids.len();

    let messages = fetch_all(api, &ids)?;
    let selected = rank_by_recency(messages, fetch.message_limit);
    info!(
        selected = selected.len(),
        limit = fetch.message_limit,
        "Selected most recent messages"
    );

    let persister = AttachmentPersister::new(api, &target_directory);
    persister.ensure_target_dir().map_err(|e| {
        GrabError::Config(format!(
            "target directory '{}' is unusable: {e}",
            target_directory.display()
        ))
    })?;

    for message in &selected {
        info!(
            message_id = %message.id,
            subject = %message.subject(),
            received = %message.received_at().format("%Y-%m-%d %H:%M:%S"),
            "Processing message"
        );

        let descriptors = match collect_attachments(message) {
            Ok(d) => d,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Skipping message");
                report.failed_messages.push(FailedMessage {
                    id: message.id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if descriptors.is_empty() {
            info!(message_id = %message.id, "No attachments found in this message");
        }

        report.messages.push(MessageSummary {
            id: message.id.clone(),
            subject: message.subject().to_string(),
            received_at: message.received_at(),
            attachments: descriptors.len(),
        });

        let saved = persister.persist_all(&descriptors, progress)?;
        report.attachments.extend(saved);
    }

    Ok(report)
}

/// Fetch every candidate in order. The first failure aborts.
fn fetch_all<A: MailApi>(api: &A, ids: &[MessageId]) -> Result<Vec<Message>> {
    let mut messages = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        tracing::debug!(message_id = %id, n = i + 1, total = ids.len(), "Fetching message");
        let message = api.fetch_message(id)?;
        tracing::debug!(
            message_id = %id,
            internal_date = message.internal_date,
            subject = %message.subject(),
            "Fetched message"
        );
        messages.push(message);
    }
    Ok(messages)
}
