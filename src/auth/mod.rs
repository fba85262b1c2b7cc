//! OAuth session handling for the Gmail API.
//!
//! A session is obtained from, in order of preference: a still-valid stored
//! token, a refreshed stored token, or the interactive browser flow.

pub mod flow;
pub mod pkce;
pub mod secrets;
pub mod token;

use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::config::AccountConfig;
use crate::error::{GrabError, Result};

use self::flow::InstalledAppFlow;
use self::secrets::ClientSecrets;
use self::token::{Token, TokenStore};

/// An authenticated handle for API calls.
#[derive(Debug, Clone)]
pub struct Session {
    token: Token,
}

impl Session {
    pub fn new(token: Token) -> Self {
        Self { token }
    }

    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    pub fn token(&self) -> &Token {
        &self.token
    }
}

/// Obtain a session, refreshing or re-authorizing as needed.
///
/// Any new token is written back to the token store.
pub fn authenticate(account: &AccountConfig, http: &Client) -> Result<Session> {
    let store = TokenStore::new(account.token_store_path());

    let stored = match store.load() {
        Ok(token) => token,
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "Ignoring unreadable token store");
            None
        }
    };

    if let Some(token) = &stored {
        if token.is_valid() {
            info!("Using stored access token");
            return Ok(Session::new(token.clone()));
        }
    }

    let secrets_path = account.credentials_path();
    let secrets = ClientSecrets::load(&secrets_path)?;

    let token = match stored {
        Some(token) if token.refresh_token.is_some() => {
            info!("Refreshing expired access token");
            match flow::refresh_token(http, &secrets, &token) {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!(error = %e, "Refresh failed, starting a new authorization");
                    InstalledAppFlow::new(&secrets, http).run()?
                }
            }
        }
        _ => InstalledAppFlow::new(&secrets, http).run()?,
    };

    store.save(&token).map_err(|e| {
        GrabError::Auth(format!(
            "cannot save token to '{}': {e}",
            store.path().display()
        ))
    })?;
    info!("Authentication successful");
    Ok(Session::new(token))
}
