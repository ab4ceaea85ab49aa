//! Registration and claim verification.
//!
//! An agent moves through three states:
//!
//! ```text
//! NoCredentials --register--> RegisteredUnverified --"claimed"--> Verified
//! ```
//!
//! `Verified` is terminal. Nothing here ever deletes stored credentials, so
//! a timed-out or cancelled wait can be resumed on the next run.

use serde_json::Value;

use crate::api::{MoltbookClient, RegisterRequest, Registration};
use crate::cancel::CancelToken;
use crate::config::{ClientConfig, PollSettings};
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    NoCredentials,
    RegisteredUnverified,
    Verified,
}

/// The `status` field of `GET /agents/status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStatus {
    Claimed,
    PendingClaim,
    Unknown(String),
}

impl ClaimStatus {
    pub fn from_value(response: &Value) -> Self {
        match response.get("status").and_then(Value::as_str) {
            Some("claimed") => ClaimStatus::Claimed,
            Some("pending_claim") => ClaimStatus::PendingClaim,
            Some(other) => ClaimStatus::Unknown(other.to_string()),
            None => ClaimStatus::Unknown("unknown".to_string()),
        }
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimStatus::Claimed)
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimStatus::Claimed => write!(f, "claimed"),
            ClaimStatus::PendingClaim => write!(f, "pending_claim"),
            ClaimStatus::Unknown(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Verified { attempts: u32 },
    TimedOut { attempts: u32 },
    Cancelled { attempts: u32 },
}

pub struct Sequencer {
    config: ClientConfig,
    store: CredentialStore,
    client: Option<MoltbookClient>,
    state: AgentState,
}

impl Sequencer {
    /// Start from whatever the credential store holds. Stored credentials
    /// put the sequencer in `RegisteredUnverified` until a status check says
    /// otherwise.
    pub fn new(config: ClientConfig, store: CredentialStore) -> Result<Self> {
        let (client, state) = match store.load()? {
            Some(creds) => (
                Some(MoltbookClient::new(&config, Some(creds.api_key))?),
                AgentState::RegisteredUnverified,
            ),
            None => (None, AgentState::NoCredentials),
        };
        Ok(Self {
            config,
            store,
            client,
            state,
        })
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn client(&self) -> Option<&MoltbookClient> {
        self.client.as_ref()
    }

    pub fn into_client(self) -> Option<MoltbookClient> {
        self.client
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Register a new agent and persist its key. On failure the state is
    /// left as it was.
    pub fn register(&mut self, name: &str, description: &str) -> Result<Registration> {
        let req = RegisterRequest {
            name: name.to_string(),
            description: description.to_string(),
        };
        let registration = MoltbookClient::register(&self.config, &req)?;
        let client = MoltbookClient::new(&self.config, Some(registration.api_key.clone()))?;
        self.store.save(&registration.api_key, name)?;

        self.client = Some(client);
        self.state = AgentState::RegisteredUnverified;
        tracing::info!(agent = name, "agent registered, awaiting claim");
        Ok(registration)
    }

    /// Ask the API for the claim status; `claimed` moves to `Verified`.
    pub fn check_status(&mut self) -> Result<ClaimStatus> {
        let client = self.client.as_ref().ok_or_else(|| Error::MissingApiKey {
            env: self.config.api_key_env.clone(),
        })?;
        let status = ClaimStatus::from_value(&client.get_status()?);
        tracing::debug!(%status, "claim status");

        if status.is_claimed() {
            self.state = AgentState::Verified;
        }
        Ok(status)
    }

    /// Poll until verified, out of attempts, or cancelled.
    ///
    /// Makes at most `settings.max_attempts` status checks with
    /// `settings.interval` between consecutive checks. `on_pending` is
    /// called after each unsuccessful check with the attempt number.
    pub fn await_verification<F>(
        &mut self,
        settings: PollSettings,
        cancel: &CancelToken,
        mut on_pending: F,
    ) -> Result<PollOutcome>
    where
        F: FnMut(u32, &ClaimStatus),
    {
        if self.state == AgentState::Verified {
            return Ok(PollOutcome::Verified { attempts: 0 });
        }

        let mut attempts = 0;
        while attempts < settings.max_attempts {
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled { attempts });
            }

            attempts += 1;
            let status = self.check_status()?;
            if status.is_claimed() {
                return Ok(PollOutcome::Verified { attempts });
            }
            on_pending(attempts, &status);

            if attempts < settings.max_attempts && cancel.wait(settings.interval) {
                tracing::info!(attempts, "verification polling cancelled");
                return Ok(PollOutcome::Cancelled { attempts });
            }
        }

        tracing::warn!(attempts, "verification polling timed out");
        Ok(PollOutcome::TimedOut { attempts })
    }
}
