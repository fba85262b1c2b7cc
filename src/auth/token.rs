//! OAuth tokens and their on-disk store.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GrabError, Result};

/// Tokens within this many seconds of expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth access token with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    /// Usually "Bearer".
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Token {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_at: None,
            refresh_token: None,
            scope: None,
        }
    }

    pub fn from_response(response: TokenResponse) -> Self {
        let expires_at = response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs as i64));
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at,
            refresh_token: response.refresh_token,
            scope: response.scope,
        }
    }

    /// Expired, or about to expire within a minute.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= exp)
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Successful answer of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Error answer of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

impl ErrorResponse {
    pub fn into_error(self) -> GrabError {
        if self.error_description.is_empty() {
            GrabError::Auth(self.error)
        } else {
            GrabError::Auth(format!("{} - {}", self.error, self.error_description))
        }
    }
}

/// JSON file holding the last token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored token. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<Token>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No stored token");
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| GrabError::io(&self.path, e))?;
        let token = serde_json::from_str(&contents).map_err(|e| {
            GrabError::Auth(format!(
                "token store '{}' is unreadable: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(token))
    }

    /// Replace the stored token atomically. The file is private to the user on Unix.
    pub fn save(&self, token: &Token) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| GrabError::io(&parent, e))?;

        let json = serde_json::to_vec_pretty(token)
            .map_err(|e| GrabError::Auth(format!("cannot serialize token: {e}")))?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| GrabError::io(&parent, e))?;
        tmp.write_all(&json).map_err(|e| GrabError::io(tmp.path(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))
                .map_err(|e| GrabError::io(tmp.path(), e))?;
        }

        tmp.persist(&self.path)
            .map_err(|e| GrabError::io(&self.path, e.error))?;
        info!(path = %self.path.display(), "Saved token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiration() {
        let expired =
            Token::new("access", "Bearer").with_expires_at(Utc::now() - Duration::seconds(120));
        assert!(expired.is_expired());
        assert!(!expired.is_valid());

        let almost = Token::new("access", "Bearer").with_expires_at(Utc::now() + Duration::seconds(30));
        assert!(almost.is_expired());

        let valid =
            Token::new("access", "Bearer").with_expires_at(Utc::now() + Duration::seconds(3600));
        assert!(valid.is_valid());
    }

    #[test]
    fn test_token_without_expiry_is_valid() {
        assert!(Token::new("access", "Bearer").is_valid());
        assert!(!Token::new("", "Bearer").is_valid());
    }

    #[test]
    fn test_from_response() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token": "ya29.a0", "expires_in": 3599,
                "refresh_token": "1//0g", "scope": "https://www.googleapis.com/auth/gmail.readonly",
                "token_type": "Bearer"}"#,
        )
        .unwrap();
        let token = Token::from_response(response);
        assert_eq!(token.access_token, "ya29.a0");
        assert_eq!(token.refresh_token.as_deref(), Some("1//0g"));
        assert!(token.is_valid());
    }

    #[test]
    fn test_error_response_becomes_auth_error() {
        let resp: ErrorResponse = serde_json::from_str(
            r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#,
        )
        .unwrap();
        let err = resp.into_error();
        assert!(matches!(err, GrabError::Auth(ref m) if m.contains("invalid_grant")));
    }

    #[test]
    fn test_store_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("nested").join("token.json"));
        assert!(store.load().unwrap().is_none());

        let token = Token::new("access", "Bearer").with_refresh_token("refresh");
        store.save(&token).unwrap();
        assert_eq!(store.load().unwrap(), Some(token));
    }

    #[cfg(unix)]
    #[test]
    fn test_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("token.json"));
        store.save(&Token::new("access", "Bearer")).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_store_is_auth_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        let err = TokenStore::new(&path).load().unwrap_err();
        assert!(matches!(err, GrabError::Auth(_)));
    }
}
