//! Process-wide settings, resolved once in `main` and handed to the
//! components that need them.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://www.moltbook.com/api/v1";
pub const API_KEY_ENV: &str = "MOLTBOOK_API_KEY";
pub const BASE_URL_ENV: &str = "MOLTBOOK_BASE_URL";
pub const CREDENTIALS_ENV: &str = "MOLTBOOK_CREDENTIALS";
pub const DEFAULT_HEARTBEAT_STATE: &str = "heartbeat-state.json";

/// Settings for the HTTP side.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Name of the environment variable holding the fallback API key.
    pub api_key_env: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            api_key_env: API_KEY_ENV.to_string(),
        }
    }
}

impl ClientConfig {
    /// Config pointed at `base_url`, everything else default.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            ..Self::default()
        })
    }

    /// Append path segments to the base URL. Each segment is
    /// percent-encoded, so an id containing `/` or `?` stays one segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("base URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// How the verification wait polls the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub credentials_path: PathBuf,
    pub heartbeat_state_path: PathBuf,
    pub poll: PollSettings,
}

impl AppConfig {
    /// Build the config from `MOLTBOOK_BASE_URL` and `MOLTBOOK_CREDENTIALS`,
    /// falling back to the public API and `~/.config/moltbook/credentials.json`.
    pub fn from_env() -> Result<Self> {
        let client = match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => ClientConfig::with_base_url(&url)?,
            _ => ClientConfig::default(),
        };

        let credentials_path = match std::env::var(CREDENTIALS_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_credentials_path(),
        };

        Ok(Self {
            client,
            credentials_path,
            heartbeat_state_path: PathBuf::from(DEFAULT_HEARTBEAT_STATE),
            poll: PollSettings::default(),
        })
    }
}

/// `~/.config/moltbook/credentials.json`, or relative to the working
/// directory when no home directory can be found.
pub fn default_credentials_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join("moltbook").join("credentials.json")
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "base URL must start with http:// or https://, got '{}'",
            raw
        )));
    }
    Ok(trimmed.to_string())
}
