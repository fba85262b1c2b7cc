//! OAuth client secrets as downloaded from the Google Cloud console.

use std::path::Path;

use serde::Deserialize;

use crate::error::{GrabError, Result};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Credentials of the OAuth client application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The console wraps the secrets in an `installed` or `web` object.
#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(json)
            .map_err(|e| GrabError::Auth(format!("malformed client secrets: {e}")))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| GrabError::Auth("client secrets have no 'installed' or 'web' section".into()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GrabError::Auth(format!(
                "cannot read client secrets '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&contents)
    }
}
