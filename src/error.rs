//! Error types for the Moltbook client

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No API key available: pass one explicitly or set {env}")]
    MissingApiKey { env: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// The API answered with a status >= 400.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Response was not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Malformed state file {}: {source}", path.display())]
    MalformedState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Registration failed: {0}")]
    Registration(String),
}

impl Error {
    /// Status code of the remote error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 401/403, which no amount of retrying will fix.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::MalformedState {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e)
        } else {
            Error::Network(e)
        }
    }
}
