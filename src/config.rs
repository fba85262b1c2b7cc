//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the `--config` command line flag
//! 2. `$MAILGRAB_CONFIG` (environment variable)
//! 3. `~/.config/mailgrab/config.toml` (Linux)
//!    `~/Library/Application Support/mailgrab/config.toml` (macOS)
//!    `%APPDATA%\mailgrab\config.toml` (Windows)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::retry::RetryPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where credentials and tokens live.
    pub account: AccountConfig,
    /// What to search for and where to save it.
    pub fetch: FetchConfig,
    /// HTTP timeouts and retries.
    pub network: NetworkConfig,
    /// Queries for the `probe` diagnostic command.
    pub probe: ProbeConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Credential locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// OAuth client secrets JSON downloaded from the Google Cloud console.
    pub credentials_path: Option<PathBuf>,
    /// File holding the access and refresh tokens between runs.
    pub token_store_path: Option<PathBuf>,
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Directory attachments are written to.
    pub target_directory: Option<PathBuf>,
    /// Number of most recent messages to take attachments from.
    pub message_limit: usize,
    /// Maximum ids requested per search call.
    pub max_results: u32,
    /// Search queries, tried in order until one matches.
    pub search_patterns: Vec<String>,
}

/// HTTP behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL of the Gmail REST API.
    pub api_base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per call, including the first.
    pub retry_attempts: u32,
    /// Delay before the first retry, doubled for each further one.
    pub retry_base_delay_ms: u64,
}

/// Diagnostic search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Queries to report on. An empty string lists recent mail unfiltered.
    pub queries: Vec<String>,
    /// Number of subjects shown per query.
    pub sample: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            target_directory: None,
            message_limit: 2,
            max_results: 50,
            search_patterns: vec![
                r#"subject:"Latest Log File" has:attachment"#.to_string(),
                r#"subject:"Latest Log Files" has:attachment"#.to_string(),
                "subject:latest subject:log has:attachment".to_string(),
                "subject:log has:attachment".to_string(),
                "has:attachment".to_string(),
            ],
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            timeout_secs: 30,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            queries: vec![
                String::new(),
                r#"subject:"Latest Log File""#.to_string(),
                "subject:latest".to_string(),
                "subject:log".to_string(),
                "has:attachment".to_string(),
            ],
            sample: 3,
        }
    }
}

// ── Derived values ──────────────────────────────────────────────

impl AccountConfig {
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| app_config_dir().join("client_secret.json"))
    }

    pub fn token_store_path(&self) -> PathBuf {
        self.token_store_path
            .clone()
            .unwrap_or_else(|| app_config_dir().join("token.json"))
    }
}

impl FetchConfig {
    /// Directory attachments go to, defaulting to `<downloads>/gmail_attachments`.
    pub fn target_directory(&self) -> PathBuf {
        if let Some(ref dir) = self.target_directory {
            return dir.clone();
        }
        dirs::download_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gmail_attachments")
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration from `explicit` if given, else from the standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let path = explicit.map(Path::to_path_buf).or_else(config_file_path);
    if let Some(path) = path {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        } else if explicit.is_some() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILGRAB_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailgrab").join("config.toml"))
}

/// Per-user directory holding the config file, client secrets and tokens.
fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailgrab")
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailgrab")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.fetch.message_limit, 2);
        assert_eq!(cfg.fetch.max_results, 50);
        assert_eq!(cfg.fetch.search_patterns.len(), 5);
        assert_eq!(cfg.fetch.search_patterns[4], "has:attachment");
        assert_eq!(cfg.network.retry_attempts, 3);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.search_patterns, cfg.fetch.search_patterns);
        assert_eq!(parsed.network.api_base_url, cfg.network.api_base_url);
        assert_eq!(parsed.probe.queries, cfg.probe.queries);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[fetch]
message_limit = 5
search_patterns = ["from:backups@example.com has:attachment"]

[account]
token_store_path = "/tmp/mailgrab-token.json"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.fetch.message_limit, 5);
        assert_eq!(cfg.fetch.search_patterns.len(), 1);
        assert_eq!(
            cfg.account.token_store_path(),
            PathBuf::from("/tmp/mailgrab-token.json")
        );
        // Other fields use defaults
        assert_eq!(cfg.fetch.max_results, 50);
        assert_eq!(cfg.network.timeout_secs, 30);
    }

    #[test]
    fn test_explicit_target_directory_wins() {
        let fetch = FetchConfig {
            target_directory: Some(PathBuf::from("/srv/logs")),
            ..FetchConfig::default()
        };
        assert_eq!(fetch.target_directory(), PathBuf::from("/srv/logs"));
        assert!(FetchConfig::default()
            .target_directory()
            .ends_with("gmail_attachments"));
    }

    #[test]
    fn test_retry_policy_from_network_config() {
        let policy = NetworkConfig::default().retry_policy();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_load_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[fetch]\nmessage_limit = 7\n").unwrap();
        assert_eq!(load_config(Some(&path)).fetch.message_limit, 7);
    }

    #[test]
    fn test_load_broken_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[fetch\nmessage_limit = ").unwrap();
        assert_eq!(load_config(Some(&path)).fetch.message_limit, 2);
    }
}
