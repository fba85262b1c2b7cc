//! Installed-application authorization: loopback redirect, code exchange, refresh.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tracing::{debug, info};
use url::Url;

use super::pkce::{random_token, PkceChallenge};
use super::secrets::ClientSecrets;
use super::token::{ErrorResponse, Token, TokenResponse};
use crate::error::{GrabError, Result};

/// Read-only access to the mailbox is all the downloader needs.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// How long to wait for the browser to hit the redirect.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const CALLBACK_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\
    Connection: close\r\n\r\n<html><body><h1>Authorization complete</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

/// Authorization code flow with a one-shot HTTP listener on 127.0.0.1.
pub struct InstalledAppFlow<'a> {
    secrets: &'a ClientSecrets,
    http: &'a Client,
    scopes: Vec<String>,
}

impl<'a> InstalledAppFlow<'a> {
    pub fn new(secrets: &'a ClientSecrets, http: &'a Client) -> Self {
        Self {
            secrets,
            http,
            scopes: vec![GMAIL_READONLY_SCOPE.to_string()],
        }
    }

    /// Build the consent URL the user has to open.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        pkce: &PkceChallenge,
    ) -> Result<Url> {
        let mut url = Url::parse(&self.secrets.auth_uri)
            .map_err(|e| GrabError::Auth(format!("invalid auth_uri: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", pkce.method())
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url)
    }

    /// Run the whole interactive flow and return a fresh token.
    pub fn run(&self) -> Result<Token> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .map_err(|e| GrabError::Auth(format!("cannot start redirect listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| GrabError::Auth(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}");

        let pkce = PkceChallenge::generate();
        let state = random_token(16);
        let auth_url = self.authorization_url(&redirect_uri, &state, &pkce)?;

        eprintln!("Open this URL in your browser to authorize access to your mailbox:\n");
        eprintln!("  {auth_url}\n");
        eprintln!("Waiting for the authorization response...");

        let (code, returned_state) = wait_for_callback(&listener, CALLBACK_TIMEOUT)?;
        if returned_state != state {
            return Err(GrabError::Auth("state mismatch in authorization response".into()));
        }
        info!("Authorization code received");

        self.exchange_code(&code, &redirect_uri, &pkce.verifier)
    }

    /// Exchange an authorization code for tokens.
    pub fn exchange_code(&self, code: &str, redirect_uri: &str, verifier: &str) -> Result<Token> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("code_verifier", verifier),
        ];
        if let Some(secret) = &self.secrets.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        request_token(self.http, &self.secrets.token_uri, &params)
    }
}

/// Use the refresh token of `token` to get a new access token.
///
/// The old refresh token is kept when the server does not issue a new one.
pub fn refresh_token(http: &Client, secrets: &ClientSecrets, token: &Token) -> Result<Token> {
    let refresh = token
        .refresh_token
        .as_deref()
        .ok_or_else(|| GrabError::Auth("no refresh token available".into()))?;

    let mut params = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh),
        ("client_id", secrets.client_id.as_str()),
    ];
    if let Some(secret) = &secrets.client_secret {
        params.push(("client_secret", secret.as_str()));
    }

    let mut fresh = request_token(http, &secrets.token_uri, &params)?;
    if fresh.refresh_token.is_none() {
        fresh.refresh_token.clone_from(&token.refresh_token);
    }
    Ok(fresh)
}

fn request_token(http: &Client, token_uri: &str, params: &[(&str, &str)]) -> Result<Token> {
    debug!(token_uri, grant = params[0].1, "Requesting token");
    let response = http
        .post(token_uri)
        .form(params)
        .send()
        .map_err(|e| GrabError::Auth(format!("token endpoint unreachable: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|e| GrabError::Auth(format!("cannot read token response: {e}")))?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => err.into_error(),
            Err(_) => GrabError::Auth(format!("token endpoint answered {status}")),
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| GrabError::Auth(format!("invalid token response: {e}")))?;
    Ok(Token::from_response(parsed))
}

/// Accept connections until one carries the authorization redirect.
fn wait_for_callback(listener: &TcpListener, timeout: Duration) -> Result<(String, String)> {
    listener
        .set_nonblocking(true)
        .map_err(|e| GrabError::Auth(e.to_string()))?;
    let deadline = Instant::now() + timeout;

    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                if let Some(result) = handle_callback(stream)? {
                    return Ok(result);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(GrabError::Auth(format!(
                        "no authorization response within {} seconds",
                        timeout.as_secs()
                    )));
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(GrabError::Auth(e.to_string())),
        }
    }
}

/// Read one request. `Ok(None)` for requests that are not the redirect (e.g. favicon).
fn handle_callback(mut stream: TcpStream) -> Result<Option<(String, String)>> {
    stream
        .set_nonblocking(false)
        .and_then(|_| stream.set_read_timeout(Some(Duration::from_secs(10))))
        .map_err(|e| GrabError::Auth(e.to_string()))?;

    let mut buffer = [0u8; 8192];
    let n = stream
        .read(&mut buffer)
        .map_err(|e| GrabError::Auth(format!("cannot read redirect request: {e}")))?;
    let request = String::from_utf8_lossy(&buffer[..n]);

    let parsed = parse_callback_request(&request);
    if !matches!(parsed, Ok(None)) {
        let _ = stream.write_all(CALLBACK_RESPONSE.as_bytes());
        let _ = stream.flush();
    }
    parsed
}

/// Extract `code` and `state` from the request line of the redirect.
pub fn parse_callback_request(request: &str) -> Result<Option<(String, String)>> {
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("");
    let Some((_, query)) = target.split_once('?') else {
        return Ok(None);
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(GrabError::Auth(format!("authorization denied: {error}")));
    }
    match (code, state) {
        (Some(code), Some(state)) => Ok(Some((code, state))),
        (Some(_), None) => Err(GrabError::Auth("authorization response has no state".into())),
        _ => Ok(None),
    }
}
