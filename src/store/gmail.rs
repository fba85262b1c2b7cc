//! Gmail REST API client.

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};

use super::retry::RetryPolicy;
use super::wire::{ListMessagesResponse, WireAttachment, WireMessage};
use super::MailApi;
use crate::auth::Session;
use crate::config::NetworkConfig;
use crate::error::{GrabError, Result};
use crate::model::attachment::EncodedBytes;
use crate::model::message::{Message, MessageId};

/// Blocking client for one authenticated Gmail mailbox.
pub struct GmailClient {
    http: Client,
    base_url: String,
    user_id: String,
    session: Session,
    retry: RetryPolicy,
}

/// Build the HTTP client shared by authentication and API calls.
pub fn http_client(network: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .timeout(network.timeout())
        .user_agent(concat!("mailgrab/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GrabError::Config(format!("cannot build HTTP client: {e}")))
}

impl GmailClient {
    pub fn new(http: Client, session: Session, network: &NetworkConfig) -> Self {
        Self {
            http,
            base_url: network.api_base_url.trim_end_matches('/').to_string(),
            user_id: "me".to_string(),
            session,
            retry: network.retry_policy(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.base_url, self.user_id)
    }

    /// GET `url` with `query`, retried per policy, decoded as JSON.
    fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.retry.run(operation, || {
            trace!(operation, url, "GET");
            let response = self
                .http
                .get(url)
                .bearer_auth(self.session.access_token())
                .query(query)
                .send()
                .map_err(|e| classify_reqwest(operation, &e))?;
            let response = check_status(operation, response)?;
            response.json::<T>().map_err(|e| {
                if e.is_decode() {
                    GrabError::InvalidResponse(format!("{operation}: {e}"))
                } else {
                    classify_reqwest(operation, &e)
                }
            })
        })
    }
}

impl MailApi for GmailClient {
    fn search_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageId>> {
        let mut params = vec![("maxResults", max_results.to_string())];
        if !query.is_empty() {
            params.push(("q", query.to_string()));
        }
        let operation = format!("search '{query}'");
        let list: ListMessagesResponse = self.get_json(&operation, &self.messages_url(), &params)?;
        debug!(
            query,
            hits = list.messages.len(),
            estimate = list.result_size_estimate.unwrap_or(0),
            "Search finished"
        );
        Ok(list.messages.into_iter().map(|m| MessageId(m.id)).collect())
    }

    fn fetch_message(&self, id: &MessageId) -> Result<Message> {
        let url = format!("{}/{}", self.messages_url(), id);
        let operation = format!("fetch message {id}");
        let wire: WireMessage =
            self.get_json(&operation, &url, &[("format", "full".to_string())])?;
        Message::try_from(wire)
    }

    fn fetch_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<EncodedBytes> {
        let url = format!(
            "{}/{}/attachments/{}",
            self.messages_url(),
            message_id,
            attachment_id
        );
        let operation = format!("fetch attachment of message {message_id}");
        let wire: WireAttachment = self.get_json(&operation, &url, &[])?;
        Ok(EncodedBytes::from(wire))
    }
}

/// Map an HTTP status to an error, passing successful responses through.
fn check_status(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(classify_status(operation, status, &body))
}

/// Error envelope of Google APIs.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

impl ApiError {
    /// Quota errors arrive as 403 as well as 429.
    fn is_rate_limit(&self) -> bool {
        self.status.as_deref() == Some("RESOURCE_EXHAUSTED")
            || self.errors.iter().any(|e| {
                matches!(
                    e.reason.as_deref(),
                    Some("rateLimitExceeded" | "userRateLimitExceeded")
                )
            })
    }
}

fn parse_api_error(body: &str) -> ApiError {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_default()
}

/// 401 and non-quota 403 are auth failures; 429, quota 403 and 5xx may go away on retry.
pub fn classify_status(operation: &str, status: StatusCode, body: &str) -> GrabError {
    let api_error = parse_api_error(body);
    let detail = api_error
        .message
        .clone()
        .unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::FORBIDDEN if api_error.is_rate_limit() => {
            GrabError::transport(operation, detail, true)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GrabError::Auth(format!("{operation}: {detail}"))
        }
        StatusCode::TOO_MANY_REQUESTS => GrabError::transport(operation, detail, true),
        s if s.is_server_error() => GrabError::transport(operation, detail, true),
        _ => GrabError::transport(operation, detail, false),
    }
}

fn classify_reqwest(operation: &str, e: &reqwest::Error) -> GrabError {
    let transient = e.is_timeout() || e.is_connect() || e.is_request() || e.is_body();
    GrabError::transport(operation, e, transient)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_RATE_LIMIT: &str = r#"{
      "error": {
        "code": 403,
        "message": "User-rate limit exceeded.",
        "errors": [
          {
            "message": "User-rate limit exceeded.",
            "domain": "usageLimits",
            "reason": "userRateLimitExceeded"
          }
        ],
        "status": "PERMISSION_DENIED"
      }
    }"#;

    const INSUFFICIENT_SCOPE: &str = r#"{
      "error": {
        "code": 403,
        "message": "Request had insufficient authentication scopes.",
        "errors": [
          {
            "message": "Insufficient Permission",
            "domain": "global",
            "reason": "insufficientPermissions"
          }
        ],
        "status": "PERMISSION_DENIED"
      }
    }"#;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status("search", StatusCode::UNAUTHORIZED, ""),
            GrabError::Auth(_)
        ));
        assert!(matches!(
            classify_status("search", StatusCode::FORBIDDEN, "<html>"),
            GrabError::Auth(_)
        ));
        assert!(classify_status("search", StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status("search", StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(!classify_status("search", StatusCode::NOT_FOUND, "").is_transient());
    }

    #[test]
    fn test_forbidden_rate_limit_is_transient() {
        let err = classify_status("search 'x'", StatusCode::FORBIDDEN, USER_RATE_LIMIT);
        assert!(err.is_transient());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("User-rate limit exceeded."));

        let exhausted = r#"{"error": {"code": 403, "message": "Quota", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_status("search", StatusCode::FORBIDDEN, exhausted).is_transient());
    }

    #[test]
    fn test_forbidden_scope_error_stays_auth() {
        let err = classify_status("search", StatusCode::FORBIDDEN, INSUFFICIENT_SCOPE);
        assert!(matches!(err, GrabError::Auth(ref m) if m.contains("insufficient authentication scopes")));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rate_limited_forbidden_is_retried() {
        let policy = RetryPolicy::new(3, std::time::Duration::ZERO);
        let mut calls = 0;
        let result = policy.run("search", || {
            calls += 1;
            if calls < 3 {
                Err(classify_status("search", StatusCode::FORBIDDEN, USER_RATE_LIMIT))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        assert_eq!(
            parse_api_error(body).message.as_deref(),
            Some("Requested entity was not found.")
        );
        assert_eq!(parse_api_error("<html>").message, None);
        assert_eq!(
            classify_status("fetch", StatusCode::NOT_FOUND, "<html>").to_string(),
            "fetch failed: 404 Not Found"
        );
    }

    #[test]
    fn test_base_url_is_normalized() {
        let network = NetworkConfig {
            api_base_url: "http://localhost:8080/gmail/v1/".into(),
            ..NetworkConfig::default()
        };
        let client = GmailClient::new(
            http_client(&network).unwrap(),
            Session::new(crate::auth::token::Token::new("t", "Bearer")),
            &network,
        );
        assert_eq!(
            client.messages_url(),
            "http://localhost:8080/gmail/v1/users/me/messages"
        );
    }
}
