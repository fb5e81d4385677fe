use std::sync::Arc;

use crate::models::config::RecordingConfig;
use crate::models::error::{ErrorCode, RecordingError, WarningCode};
use crate::models::frame::{AudioFrame, VideoFrame};
use crate::models::participant::{OfflineReason, UserJoinInfo};

/// Everything the transport needs to join a channel.
#[derive(Debug, Clone)]
pub struct ChannelRequest {
    pub app_id: String,
    pub channel_key: Option<String>,
    pub channel_id: String,
    pub uid: u32,
    pub config: RecordingConfig,
}

/// Something the network side has to report to the engine.
#[derive(Debug)]
pub enum TransportEvent {
    /// Channel signaling accepted the join.
    JoinConfirmed,
    /// Recoverable lookup/open problem; the transport keeps trying.
    Warning(WarningCode),
    /// The join attempt is over and did not succeed.
    JoinFailed(ErrorCode),
    /// The established session broke down.
    ConnectionLost,
    UserJoined { uid: u32, info: UserJoinInfo },
    UserOffline { uid: u32, reason: OfflineReason },
    AudioFrame { uid: u32, frame: AudioFrame },
    VideoFrame { uid: u32, frame: VideoFrame },
}

/// Callback the transport feeds events into.
///
/// Bound to the join attempt it was handed out for: once that attempt is
/// left or replaced, events are discarded and `Ok(())` is returned.
/// An `Err` means the engine rejected the event (e.g. duplicate uid).
pub type TransportCallback = Arc<dyn Fn(TransportEvent) -> Result<(), RecordingError> + Send + Sync + 'static>;

/// Network transport and channel signaling.
///
/// Implementations own sockets, key validation, decryption and decoding;
/// the engine only sees the events they report.
pub trait ChannelTransport: Send {
    /// Start joining the channel. Must return without waiting for the
    /// outcome, which is reported through `callback` from the transport's
    /// own threads. `callback` must not be invoked before `open` returns.
    fn open(&mut self, request: &ChannelRequest, callback: TransportCallback) -> Result<(), RecordingError>;

    /// Leave the channel and stop reporting events.
    ///
    /// May be reached from inside `callback` when a handler leaves the
    /// channel, so it must not wait for the callback thread to finish.
    /// After reporting `JoinFailed` or `ConnectionLost` the transport
    /// counts as closed and `close` is not called for that attempt.
    fn close(&mut self) -> Result<(), RecordingError>;
}
