//! Periodic check-in: status, DMs and the newest posts, then record when we
//! last looked in a small JSON state file.

use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

use crate::api::{DmActivity, MoltbookClient, PostSummary};
use crate::error::{Error, Result};
use crate::verification::ClaimStatus;

pub const FEED_SORT: &str = "new";
pub const FEED_LIMIT: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatState {
    #[serde(
        rename = "lastMoltbookCheck",
        default,
        deserialize_with = "deserialize_check_time"
    )]
    pub last_moltbook_check: Option<DateTime<Local>>,
}

/// Accepts RFC 3339 as well as offset-less ISO timestamps, which are read as
/// local time.
fn deserialize_check_time<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Local>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Local)));
    }
    let naive = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(serde::de::Error::custom)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("nonexistent local time: {}", raw)))
}

impl HeartbeatState {
    /// Read the state file; a missing file is a fresh state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::malformed(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::malformed(path, e))?;
        std::fs::write(path, json).map_err(|e| Error::io(path, e))
    }
}

#[derive(Debug, Clone)]
pub struct HeartbeatReport {
    pub previous_check: Option<DateTime<Local>>,
    pub status: ClaimStatus,
    pub dms: DmActivity,
    pub posts: Vec<PostSummary>,
    pub checked_at: DateTime<Local>,
}

/// Run one heartbeat and overwrite `state_path` with the new check time.
///
/// The state file is only written once all three calls succeed.
pub fn run(client: &MoltbookClient, state_path: &Path) -> Result<HeartbeatReport> {
    let state = HeartbeatState::load(state_path)?;

    let status = ClaimStatus::from_value(&client.get_status()?);
    let dms = DmActivity::from_value(&client.check_dms()?);
    let posts = PostSummary::list(&client.get_feed(FEED_SORT, FEED_LIMIT)?);

    let checked_at = Local::now();
    HeartbeatState {
        last_moltbook_check: Some(checked_at),
    }
    .save(state_path)?;

    tracing::info!(%status, posts = posts.len(), dm_activity = dms.has_activity, "heartbeat complete");

    Ok(HeartbeatReport {
        previous_check: state.last_moltbook_check,
        status,
        dms,
        posts,
        checked_at,
    })
}
