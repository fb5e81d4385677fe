use crate::models::error::{ErrorCode, WarningCode};
use crate::models::frame::{AudioFrame, VideoFrame};
use crate::models::participant::{OfflineReason, UserJoinInfo};

/// Observer for recording engine events.
///
/// Callbacks are serialized: the engine never invokes two of them at once,
/// and waits for each to return before moving on. They may run on the
/// transport's threads, so implementations must not block for long.
///
/// Frames are lent for the duration of the call only. Copy anything that
/// has to outlive it.
pub trait RecordingEventHandler: Send + Sync {
    /// A fatal session error; the engine is back to idle.
    fn on_error(&self, error: ErrorCode);

    /// A recoverable channel lookup/open problem; the join continues.
    fn on_warning(&self, warning: WarningCode);

    fn on_join_channel_success(&self, channel_id: &str, uid: u32);

    fn on_leave_channel(&self);

    fn on_user_joined(&self, uid: u32, info: &UserJoinInfo);

    fn on_user_offline(&self, uid: u32, reason: OfflineReason);

    fn audio_frame_received(&self, uid: u32, frame: &AudioFrame);

    /// Per-participant video, or the composited canvas under the
    /// recorder's own uid when mixing is enabled.
    fn video_frame_received(&self, uid: u32, frame: &VideoFrame);
}
