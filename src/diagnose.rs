//! Search diagnostics.
//!
//! Runs a fixed list of queries and reports how many messages each one finds,
//! with a few sample subjects. Nothing is written to disk.

use tracing::{debug, warn};

use crate::error::Result;
use crate::store::MailApi;

/// Result of one diagnostic query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeResult {
    pub query: String,
    /// Number of ids returned, capped by `max_results`.
    pub hits: usize,
    /// Subjects of the first hits, in server order.
    pub subjects: Vec<String>,
    /// Set when the query or a sample fetch failed.
    pub error: Option<String>,
}

impl ProbeResult {
    fn failed(query: &str, error: String) -> Self {
        Self {
            query: query.to_string(),
            hits: 0,
            subjects: Vec::new(),
            error: Some(error),
        }
    }
}

/// Run every query and collect per-query results.
///
/// A failing query does not stop the others.
pub fn probe<A: MailApi>(
    api: &A,
    queries: &[String],
    max_results: u32,
    sample: usize,
) -> Vec<ProbeResult> {
    queries
        .iter()
        .map(|query| match probe_one(api, query, max_results, sample) {
            Ok(result) => result,
            Err(e) => {
                warn!(query = %query, error = %e, "Diagnostic query failed");
                ProbeResult::failed(query, e.to_string())
            }
        })
        .collect()
}

fn probe_one<A: MailApi>(
    api: &A,
    query: &str,
    max_results: u32,
    sample: usize,
) -> Result<ProbeResult> {
    let ids = api.search_messages(query, max_results)?;
    debug!(query = %query, hits = ids.len(), "Diagnostic query");

    let mut subjects = Vec::with_capacity(sample.min(ids.len()));
    for id in ids.iter().take(sample) {
        let message = api.fetch_message(id)?;
        subjects.push(message.subject().to_string());
    }

    Ok(ProbeResult {
        query: query.to_string(),
        hits: ids.len(),
        subjects,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrabError;
    use crate::model::attachment::EncodedBytes;
    use crate::model::message::{Header, Message, MessageId, Part};

    struct Inbox;

    impl MailApi for Inbox {
        fn search_messages(&self, query: &str, _max_results: u32) -> Result<Vec<MessageId>> {
            match query {
                "" => Ok((1..=5).map(|i| MessageId::new(format!("m{i}"))).collect()),
                "subject:log" => Ok(vec!["m1".into()]),
                "broken" => Err(GrabError::transport("search", "500 Internal", true)),
                _ => Ok(Vec::new()),
            }
        }

        fn fetch_message(&self, id: &MessageId) -> Result<Message> {
            Ok(Message {
                id: id.clone(),
                internal_date: 0,
                headers: vec![Header::new("Subject", format!("Subject of {id}"))],
                payload: Part::default(),
            })
        }

        fn fetch_attachment(&self, _: &MessageId, _: &str) -> Result<EncodedBytes> {
            unreachable!("probe never downloads attachments")
        }
    }

    #[test]
    fn test_probe_counts_and_samples() {
        let queries = vec!["".to_string(), "subject:log".to_string(), "none".to_string()];
        let results = probe(&Inbox, &queries, 10, 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].hits, 5);
        assert_eq!(
            results[0].subjects,
            vec!["Subject of m1", "Subject of m2", "Subject of m3"]
        );
        assert_eq!(results[1].hits, 1);
        assert_eq!(results[1].subjects.len(), 1);
        assert_eq!(results[2].hits, 0);
        assert!(results[2].subjects.is_empty());
    }

    #[test]
    fn test_failed_query_does_not_stop_others() {
        let queries = vec!["broken".to_string(), "subject:log".to_string()];
        let results = probe(&Inbox, &queries, 10, 3);

        assert!(results[0].error.as_deref().unwrap().contains("500"));
        assert_eq!(results[1].hits, 1);
        assert!(results[1].error.is_none());
    }
}
