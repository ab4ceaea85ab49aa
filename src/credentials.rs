//! Local credential file: `{ "api_key": ..., "agent_name": ... }`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    /// Absent when the key came from the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

/// Reads and writes the credential file, with an environment-variable
/// fallback for the API key.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    api_key_env: String,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, api_key_env: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            api_key_env: api_key_env.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.credentials_path, &config.client.api_key_env)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials from the file, else from the environment.
    ///
    /// Returns `Ok(None)` when neither source has a key. Only an unreadable
    /// or unparseable file is an error.
    pub fn load(&self) -> Result<Option<Credentials>> {
        if self.path.exists() {
            let content =
                std::fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
            let creds: Credentials =
                serde_json::from_str(&content).map_err(|e| Error::malformed(&self.path, e))?;
            tracing::debug!(path = %self.path.display(), "loaded credentials from file");
            return Ok(Some(creds));
        }

        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                tracing::debug!(env = %self.api_key_env, "using API key from environment");
                Ok(Some(Credentials {
                    api_key: key,
                    agent_name: None,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Write the credential file, replacing whatever was there, and restrict
    /// it to the owning user.
    pub fn save(&self, api_key: &str, agent_name: &str) -> Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let creds = Credentials {
            api_key: api_key.to_string(),
            agent_name: Some(agent_name.to_string()),
        };
        let json = serde_json::to_string_pretty(&creds)
            .map_err(|e| Error::malformed(&self.path, e))?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // new files are created owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|e| Error::io(&self.path, e))?;

        // `mode` only applies on creation, so tighten a file that already existed
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            file.set_permissions(perms).map_err(|e| Error::io(&self.path, e))?;
        }

        file.write_all(json.as_bytes())
            .map_err(|e| Error::io(&self.path, e))?;

        tracing::info!(path = %self.path.display(), agent = agent_name, "saved credentials");
        Ok(self.path.clone())
    }
}
