use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Why a participant left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OfflineReason {
    Quit,
    Dropped,
    BecameAudience,
}

impl OfflineReason {
    pub fn code(self) -> i32 {
        match self {
            Self::Quit => 0,
            Self::Dropped => 1,
            Self::BecameAudience => 2,
        }
    }
}

/// Extra information attached to a participant on admission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJoinInfo {
    /// Where this participant's recordings go.
    pub recording_dir: Option<PathBuf>,
}

/// A participant currently in the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub uid: u32,
    pub info: UserJoinInfo,
}
