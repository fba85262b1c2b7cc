//! Fallback search: try queries in priority order until one matches.

use tracing::{debug, info};

use crate::error::Result;
use crate::model::message::MessageId;
use crate::store::MailApi;

/// Outcome of resolving a pattern list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// `pattern` was the first query with at least one hit.
    Matched {
        pattern: String,
        ids: Vec<MessageId>,
    },
    /// Every pattern came back empty. `tried` lists them in order.
    NoMatch { tried: Vec<String> },
}

impl Resolution {
    pub fn ids(&self) -> &[MessageId] {
        match self {
            Resolution::Matched { ids, .. } => ids,
            Resolution::NoMatch { .. } => &[],
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        match self {
            Resolution::Matched { pattern, .. } => Some(pattern),
            Resolution::NoMatch { .. } => None,
        }
    }
}

/// Issue one search per pattern, in order, stopping at the first non-empty result.
///
/// A failed call aborts immediately; later patterns are not tried.
pub fn resolve<A: MailApi>(api: &A, patterns: &[String], max_results: u32) -> Result<Resolution> {
    let mut tried = Vec::with_capacity(patterns.len());

    for pattern in patterns {
        debug!(pattern = %pattern, "Trying search pattern");
        let ids = api.search_messages(pattern, max_results)?;
        if !ids.is_empty() {
            info!(pattern = %pattern, hits = ids.len(), "Search pattern matched");
            return Ok(Resolution::Matched {
                pattern: pattern.clone(),
                ids,
            });
        }
        info!(pattern = %pattern, "No messages for search pattern");
        tried.push(pattern.clone());
    }

    Ok(Resolution::NoMatch { tried })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::error::GrabError;
    use crate::model::attachment::EncodedBytes;
    use crate::model::message::Message;

    /// Search-only fake that records every query it receives.
    #[derive(Default)]
    struct FakeSearch {
        results: HashMap<String, Vec<&'static str>>,
        failing: Option<String>,
        calls: RefCell<Vec<(String, u32)>>,
    }

    impl MailApi for FakeSearch {
        fn search_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageId>> {
            self.calls.borrow_mut().push((query.to_string(), max_results));
            if self.failing.as_deref() == Some(query) {
                return Err(GrabError::transport("search", "connection reset", false));
            }
            Ok(self
                .results
                .get(query)
                .map(|ids| ids.iter().map(|id| MessageId::from(*id)).collect())
                .unwrap_or_default())
        }

        fn fetch_message(&self, _id: &MessageId) -> Result<Message> {
            unreachable!("resolver never fetches messages")
        }

        fn fetch_attachment(&self, _m: &MessageId, _a: &str) -> Result<EncodedBytes> {
            unreachable!("resolver never fetches attachments")
        }
    }

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn queried(api: &FakeSearch) -> Vec<String> {
        api.calls.borrow().iter().map(|(q, _)| q.clone()).collect()
    }

    #[test]
    fn test_falls_back_to_first_non_empty_pattern() {
        let mut api = FakeSearch::default();
        api.results.insert("C".into(), vec!["m1", "m2"]);
        api.results.insert("D".into(), vec!["m9"]);

        let res = resolve(&api, &patterns(&["A", "B", "C", "D"]), 50).unwrap();
        assert_eq!(
            res,
            Resolution::Matched {
                pattern: "C".into(),
                ids: vec!["m1".into(), "m2".into()],
            }
        );
        assert_eq!(queried(&api), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_first_pattern_wins() {
        let mut api = FakeSearch::default();
        api.results.insert("A".into(), vec!["m1"]);
        api.results.insert("B".into(), vec!["m2"]);

        let res = resolve(&api, &patterns(&["A", "B"]), 50).unwrap();
        assert_eq!(res.pattern(), Some("A"));
        assert_eq!(queried(&api), vec!["A"]);
    }

    #[test]
    fn test_all_empty_is_no_match() {
        let api = FakeSearch::default();
        let res = resolve(&api, &patterns(&["A", "B", "C"]), 50).unwrap();
        assert_eq!(
            res,
            Resolution::NoMatch {
                tried: patterns(&["A", "B", "C"])
            }
        );
        assert!(res.ids().is_empty());
        assert!(res.pattern().is_none());
    }

    #[test]
    fn test_empty_pattern_list_is_no_match() {
        let api = FakeSearch::default();
        let res = resolve(&api, &[], 50).unwrap();
        assert!(matches!(res, Resolution::NoMatch { ref tried } if tried.is_empty()));
        assert!(queried(&api).is_empty());
    }

    #[test]
    fn test_failure_aborts_without_trying_later_patterns() {
        let mut api = FakeSearch::default();
        api.failing = Some("B".into());
        api.results.insert("C".into(), vec!["m1"]);

        let err = resolve(&api, &patterns(&["A", "B", "C"]), 50).unwrap_err();
        assert!(matches!(err, GrabError::Transport { .. }));
        assert_eq!(queried(&api), vec!["A", "B"]);
    }

    #[test]
    fn test_max_results_is_forwarded() {
        let api = FakeSearch::default();
        resolve(&api, &patterns(&["A"]), 7).unwrap();
        assert_eq!(api.calls.borrow()[0].1, 7);
    }
}
