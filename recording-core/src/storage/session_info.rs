use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::config::ChannelProfile;
use crate::models::error::RecordingError;

/// Snapshot of the live session, serializable for status endpoints and
/// sidecar files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub channel_id: String,
    pub uid: u32,
    pub channel_profile: ChannelProfile,
    pub joined: bool,
    /// RFC 3339 time the join was requested.
    pub started_at: String,
    pub session_dir: Option<PathBuf>,
    pub participants: Vec<u32>,
    pub is_mixing_enabled: bool,
}

impl SessionInfo {
    pub fn to_json(&self) -> Result<String, RecordingError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RecordingError::Internal(format!("failed to serialize session info: {}", e)))
    }
}
