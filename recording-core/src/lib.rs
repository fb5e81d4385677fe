//! # recording-core
//!
//! Channel recording engine core.
//!
//! Joins one channel at a time through a pluggable transport, tracks who is
//! in it, optionally composites participant video onto a single canvas and
//! hands every session event and frame to a user-supplied handler.
//! Network I/O, decoding and file writing live behind the
//! `ChannelTransport` and `RecordingEventHandler` traits.
//!
//! ## Architecture
//!
//! ```text
//! recording-core (this crate)
//! ├── traits/       ← ChannelTransport, RecordingEventHandler
//! ├── models/       ← RecordingError, EngineState, RecordingConfig, frames, mixing layout
//! ├── processing/   ← Compositor, I420 blending and scaling
//! ├── session/      ← RecordingEngine (state machine), participant registry, event dispatch
//! └── storage/      ← recording directory naming, session info
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{ChannelProfile, Decryption, DecryptionMode, MixResolution, RecordingConfig, RemoteVideoStreamType};
pub use models::error::{status, ErrorCode, RecordingError, WarningCode};
pub use models::frame::{
    AudioAacFrame, AudioFrame, AudioFrameType, AudioPcmFrame, Rotation, VideoFrame, VideoFrameData, VideoFrameType,
    VideoH264Frame, VideoYuvFrame,
};
pub use models::layout::{Region, RenderMode, Rgb, VideoMixingLayout};
pub use models::participant::{OfflineReason, Participant, UserJoinInfo};
pub use models::state::EngineState;
pub use processing::compositor::Compositor;
pub use session::engine::RecordingEngine;
pub use storage::session_info::SessionInfo;
pub use traits::channel_transport::{ChannelRequest, ChannelTransport, TransportCallback, TransportEvent};
pub use traits::event_handler::RecordingEventHandler;
