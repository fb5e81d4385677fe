use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Directory for one session: `<root>/<channel>_<YYYYMMDDhhmmss>`.
///
/// Path separators in the channel id are replaced so the session always
/// stays directly under `root`. Nothing is created on disk.
pub fn session_dir(root: &Path, channel_id: &str, joined_at: DateTime<Utc>) -> PathBuf {
    let channel: String = channel_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    root.join(format!("{}_{}", channel, joined_at.format("%Y%m%d%H%M%S")))
}

/// Resolve where a participant's recordings go.
///
/// An absolute request is used as is, a relative one is placed under the
/// session directory, and no request falls back to the session directory.
pub fn participant_dir(session_dir: Option<&Path>, requested: Option<&Path>) -> Option<PathBuf> {
    match (session_dir, requested) {
        (_, Some(path)) if path.is_absolute() => Some(path.to_path_buf()),
        (Some(session), Some(path)) => Some(session.join(path)),
        (Some(session), None) => Some(session.to_path_buf()),
        (None, requested) => requested.map(Path::to_path_buf),
    }
}
