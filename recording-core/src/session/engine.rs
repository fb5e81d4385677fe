use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::config::RecordingConfig;
use crate::models::error::{ErrorCode, RecordingError, WarningCode};
use crate::models::frame::{AudioFrame, VideoFrame, VideoFrameData};
use crate::models::layout::VideoMixingLayout;
use crate::models::participant::{OfflineReason, UserJoinInfo};
use crate::models::state::EngineState;
use crate::processing::compositor::Compositor;
use crate::session::dispatch::{DispatchTurn, EventDispatcher};
use crate::session::participants::{FrameVerdict, MediaKind, ParticipantRegistry};
use crate::storage::recording_dirs;
use crate::storage::session_info::SessionInfo;
use crate::traits::channel_transport::{ChannelRequest, ChannelTransport, TransportCallback, TransportEvent};
use crate::traits::event_handler::RecordingEventHandler;

const MAX_CHANNEL_ID_LEN: usize = 64;

/// How `idle_limit_sec` maps onto wall time, and how often it is checked.
#[derive(Debug, Clone, Copy)]
struct IdleTiming {
    unit: Duration,
    tick: Duration,
}

impl Default for IdleTiming {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            tick: Duration::from_millis(100),
        }
    }
}

/// One channel membership, from join request to teardown.
struct Session {
    id: Uuid,
    channel_id: String,
    uid: u32,
    config: RecordingConfig,
    started_at: DateTime<Utc>,
    session_dir: Option<PathBuf>,
    participants: ParticipantRegistry,
    last_mixed_ms: Option<u32>,
}

/// Mutable engine state, protected by `parking_lot::Mutex`.
///
/// `attempt` increases on every join and every teardown. Transport
/// callbacks carry the attempt they were created for, so anything reported
/// for an earlier attempt is recognisably stale.
struct EngineCore {
    state: EngineState,
    attempt: u64,
    session: Option<Session>,
    /// A teardown has started and its callbacks have not all fired yet.
    tearing_down: bool,
    /// Set when a handler released the engine from inside a teardown; that
    /// teardown finishes in `Released` instead of `Idle`.
    release_pending: bool,
}

impl EngineCore {
    fn is_current(&self, attempt: u64) -> bool {
        self.attempt == attempt && self.state.is_live()
    }

    /// End the session without going through `Leaving`.
    fn abort(&mut self) -> Option<Session> {
        self.attempt += 1;
        self.state = EngineState::Idle;
        self.session.take()
    }
}

enum IdleStatus {
    Waiting,
    Expired,
    Finished,
}

struct EngineInner<T> {
    app_id: String,
    dispatcher: EventDispatcher,
    core: Mutex<EngineCore>,
    /// Signalled when a teardown has delivered its last callback.
    teardown_done: Condvar,
    compositor: Mutex<Compositor>,
    transport: Mutex<T>,
    idle: IdleTiming,
}

/// Channel recording engine.
///
/// Generic over the network side via the `ChannelTransport` trait. Owns the
/// session state machine, admits and removes participants, composites
/// video when mixing is enabled, and hands every transition and frame to a
/// `RecordingEventHandler`.
///
/// ```text
/// [ChannelTransport] → TransportEvent → [RecordingEngine] ─┬→ participant frames ──→ [RecordingEventHandler]
///                                             ↑            └→ [Compositor] → canvas ─┘
///                       join / leave / layout ┘
/// ```
///
/// At most one session is live at a time. Once `release` returns every
/// call fails with `RecordingError::Released`.
pub struct RecordingEngine<T: ChannelTransport + 'static> {
    inner: Arc<EngineInner<T>>,
}

impl<T: ChannelTransport + 'static> RecordingEngine<T> {
    pub fn new(app_id: &str, handler: Arc<dyn RecordingEventHandler>, transport: T) -> Result<Self, RecordingError> {
        Self::build(app_id, handler, transport, IdleTiming::default())
    }

    fn build(
        app_id: &str,
        handler: Arc<dyn RecordingEventHandler>,
        transport: T,
        idle: IdleTiming,
    ) -> Result<Self, RecordingError> {
        if app_id.trim().is_empty() {
            return Err(RecordingError::InvalidArgument("app id must not be empty".into()));
        }
        Ok(Self {
            inner: Arc::new(EngineInner {
                app_id: app_id.to_string(),
                dispatcher: EventDispatcher::new(handler),
                core: Mutex::new(EngineCore {
                    state: EngineState::Idle,
                    attempt: 0,
                    session: None,
                    tearing_down: false,
                    release_pending: false,
                }),
                teardown_done: Condvar::new(),
                compositor: Mutex::new(Compositor::new()),
                transport: Mutex::new(transport),
                idle,
            }),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.inner.app_id
    }

    pub fn state(&self) -> EngineState {
        self.inner.core.lock().state
    }

    /// Snapshot of the live session, if any.
    pub fn session_info(&self) -> Option<SessionInfo> {
        let core = self.inner.core.lock();
        let session = core.session.as_ref()?;
        Some(SessionInfo {
            id: session.id.to_string(),
            channel_id: session.channel_id.clone(),
            uid: session.uid,
            channel_profile: session.config.channel_profile,
            joined: core.state.is_joined(),
            started_at: session.started_at.to_rfc3339(),
            session_dir: session.session_dir.clone(),
            participants: session.participants.uids(),
            is_mixing_enabled: session.config.is_mixing_enabled,
        })
    }

    /// The layout currently applied to the mixed output.
    pub fn mixing_layout(&self) -> Option<VideoMixingLayout> {
        self.inner.compositor.lock().layout().cloned()
    }

    /// Start joining `channel_id`. Transitions: idle → joining.
    ///
    /// Returns once the transport has accepted the request; the outcome
    /// arrives later as `on_join_channel_success` or `on_error`.
    pub fn join_channel(
        &self,
        channel_key: Option<&str>,
        channel_id: &str,
        uid: u32,
        config: RecordingConfig,
    ) -> Result<(), RecordingError> {
        let inner = &self.inner;
        let (request, attempt) = {
            let mut core = inner.core.lock();
            inner.wait_for_teardown(&mut core);
            match core.state {
                EngineState::Idle => {}
                EngineState::Released => return Err(RecordingError::Released),
                other => {
                    return Err(RecordingError::InvalidState(format!("cannot join while {:?}", other)));
                }
            }

            if channel_id.is_empty() || channel_id.len() > MAX_CHANNEL_ID_LEN {
                return Err(RecordingError::InvalidArgument(format!(
                    "channel id must be 1 to {} bytes",
                    MAX_CHANNEL_ID_LEN
                )));
            }
            config.validate()?;

            core.attempt += 1;
            let started_at = Utc::now();
            let session_dir = config
                .record_file_root_dir
                .as_deref()
                .map(|root| recording_dirs::session_dir(root, channel_id, started_at));
            let request = ChannelRequest {
                app_id: inner.app_id.clone(),
                channel_key: channel_key.map(str::to_string),
                channel_id: channel_id.to_string(),
                uid,
                config: config.clone(),
            };
            core.session = Some(Session {
                id: Uuid::new_v4(),
                channel_id: channel_id.to_string(),
                uid,
                config,
                started_at,
                session_dir,
                participants: ParticipantRegistry::new(),
                last_mixed_ms: None,
            });
            core.state = EngineState::Joining;
            (request, core.attempt)
        };

        inner.compositor.lock().clear();

        match request.config.decryption {
            Some(ref decryption) => log::info!(
                "joining channel {} as uid {} ({}, key {})",
                request.channel_id,
                uid,
                decryption.mode.as_str(),
                decryption.secret_fingerprint()
            ),
            None => log::info!("joining channel {} as uid {}", request.channel_id, uid),
        }

        let callback = EngineInner::callback(inner, attempt);
        if let Err(e) = inner.transport.lock().open(&request, callback) {
            log::error!("transport failed to open channel {}: {}", request.channel_id, e);
            let mut core = inner.core.lock();
            if core.is_current(attempt) {
                core.abort();
            }
            return Err(RecordingError::Internal(format!("transport open failed: {}", e)));
        }

        if request.config.idle_limit_sec > 0 {
            let limit = inner.idle.unit * request.config.idle_limit_sec;
            EngineInner::spawn_idle_watchdog(inner, attempt, limit);
        }
        Ok(())
    }

    /// Replace the mixing layout. Only while joined with mixing enabled.
    ///
    /// An invalid layout, or one whose canvas exceeds the session's mix
    /// resolution, is rejected and the current one stays in place.
    pub fn set_video_mixing_layout(&self, layout: VideoMixingLayout) -> Result<(), RecordingError> {
        let core = self.inner.core.lock();
        match core.state {
            EngineState::Joined => {}
            EngineState::Released => return Err(RecordingError::Released),
            other => {
                return Err(RecordingError::InvalidState(format!(
                    "cannot set a mixing layout while {:?}",
                    other
                )));
            }
        }
        let resolution = core
            .session
            .as_ref()
            .filter(|s| s.config.is_mixing_enabled)
            .and_then(|s| s.config.mix_resolution);
        let Some(resolution) = resolution else {
            return Err(RecordingError::InvalidState("mixing is not enabled for this session".into()));
        };
        if layout.canvas_width > resolution.width || layout.canvas_height > resolution.height {
            return Err(RecordingError::InvalidArgument(format!(
                "canvas {}x{} exceeds the mix resolution {}x{}",
                layout.canvas_width, layout.canvas_height, resolution.width, resolution.height
            )));
        }
        let regions = layout.regions.len();
        let (width, height) = (layout.canvas_width, layout.canvas_height);
        self.inner.compositor.lock().set_layout(layout)?;
        log::info!("mixing layout applied: {}x{} canvas, {} regions", width, height, regions);
        Ok(())
    }

    /// Leave the channel. Transitions: joining/joined → leaving → idle.
    ///
    /// Every participant goes offline with `Quit`, held frames are freed and
    /// `on_leave_channel` fires. A no-op when already idle. No callback for
    /// the old session fires after this returns; if another thread is
    /// already leaving, this waits for it to finish.
    pub fn leave_channel(&self) -> Result<(), RecordingError> {
        self.inner.leave(None)
    }

    /// Tear the engine down, leaving the channel first if needed. Every
    /// later call fails with `RecordingError::Released`.
    ///
    /// Called from a handler while a teardown is in flight, the engine is
    /// marked released at once and the remaining teardown callbacks fire
    /// after the handler returns.
    pub fn release(&self) -> Result<(), RecordingError> {
        loop {
            self.inner.leave(None)?;
            let mut core = self.inner.core.lock();
            match core.state {
                EngineState::Idle | EngineState::Leaving => {
                    core.release_pending = core.tearing_down;
                    core.state = EngineState::Released;
                    core.attempt += 1;
                    break;
                }
                // Re-joined from `on_leave_channel`.
                _ => {}
            }
        }
        self.inner.compositor.lock().clear();
        log::info!("recording engine released");
        Ok(())
    }
}

impl<T: ChannelTransport + 'static> Drop for RecordingEngine<T> {
    fn drop(&mut self) {
        if !self.inner.core.lock().state.is_released() {
            if let Err(e) = self.release() {
                log::warn!("release on drop failed: {}", e);
            }
        }
    }
}

impl<T: ChannelTransport + 'static> EngineInner<T> {
    fn callback(inner: &Arc<Self>, attempt: u64) -> TransportCallback {
        let weak: Weak<Self> = Arc::downgrade(inner);
        Arc::new(move |event: TransportEvent| match weak.upgrade() {
            Some(inner) => inner.handle_event(attempt, event),
            None => Ok(()),
        })
    }

    fn handle_event(&self, attempt: u64, event: TransportEvent) -> Result<(), RecordingError> {
        let turn = self.dispatcher.begin();
        match event {
            TransportEvent::JoinConfirmed => self.on_join_confirmed(&turn, attempt),
            TransportEvent::Warning(code) => self.on_warning(&turn, attempt, code),
            TransportEvent::JoinFailed(code) => self.on_join_failed(&turn, attempt, code),
            TransportEvent::ConnectionLost => self.on_connection_lost(&turn, attempt),
            TransportEvent::UserJoined { uid, info } => self.on_user_joined(&turn, attempt, uid, info),
            TransportEvent::UserOffline { uid, reason } => self.on_user_offline(&turn, attempt, uid, reason),
            TransportEvent::AudioFrame { uid, frame } => self.on_audio_frame(&turn, attempt, uid, frame),
            TransportEvent::VideoFrame { uid, frame } => self.on_video_frame(&turn, attempt, uid, frame),
        }
    }

    fn on_join_confirmed(&self, turn: &DispatchTurn<'_>, attempt: u64) -> Result<(), RecordingError> {
        let (channel_id, uid) = {
            let mut core = self.core.lock();
            if !core.is_current(attempt) {
                log::debug!("stale join confirmation ignored");
                return Ok(());
            }
            if core.state != EngineState::Joining {
                return Err(RecordingError::InvalidState("join already confirmed".into()));
            }
            core.state = EngineState::Joined;
            let Some(session) = core.session.as_mut() else {
                return Err(RecordingError::Internal("live state without a session".into()));
            };
            session.participants.start_idle_clock();
            (session.channel_id.clone(), session.uid)
        };
        log::info!("joined channel {} as uid {}", channel_id, uid);
        turn.join_channel_success(&channel_id, uid);
        Ok(())
    }

    fn on_warning(&self, turn: &DispatchTurn<'_>, attempt: u64, code: WarningCode) -> Result<(), RecordingError> {
        if !self.core.lock().is_current(attempt) {
            return Ok(());
        }
        turn.warning(code);
        Ok(())
    }

    fn on_join_failed(&self, turn: &DispatchTurn<'_>, attempt: u64, code: ErrorCode) -> Result<(), RecordingError> {
        {
            let mut core = self.core.lock();
            if !core.is_current(attempt) {
                return Ok(());
            }
            if core.state != EngineState::Joining {
                return Err(RecordingError::InvalidState(
                    "join failure reported for an established session".into(),
                ));
            }
            core.abort();
        }
        self.compositor.lock().clear();
        let code = if code == ErrorCode::Ok { ErrorCode::Failed } else { code };
        turn.error(code);
        Ok(())
    }

    fn on_connection_lost(&self, turn: &DispatchTurn<'_>, attempt: u64) -> Result<(), RecordingError> {
        let dropped = {
            let mut core = self.core.lock();
            if !core.is_current(attempt) {
                return Ok(());
            }
            core.abort()
                .map(|mut session| session.participants.drain())
                .unwrap_or_default()
        };
        self.compositor.lock().clear();
        for participant in &dropped {
            turn.user_offline(participant.uid, OfflineReason::Dropped);
        }
        turn.error(ErrorCode::InternalFailed);
        Ok(())
    }

    fn on_user_joined(
        &self,
        turn: &DispatchTurn<'_>,
        attempt: u64,
        uid: u32,
        info: UserJoinInfo,
    ) -> Result<(), RecordingError> {
        let info = {
            let mut core = self.core.lock();
            if !core.is_current(attempt) {
                return Ok(());
            }
            if core.state != EngineState::Joined {
                return Err(RecordingError::InvalidState(format!(
                    "participant {} reported before the join was confirmed",
                    uid
                )));
            }
            let Some(session) = core.session.as_mut() else {
                return Err(RecordingError::Internal("live state without a session".into()));
            };
            if uid == session.uid {
                return Err(RecordingError::InvalidArgument(format!(
                    "participant uid {} is the recorder's own",
                    uid
                )));
            }
            let info = UserJoinInfo {
                recording_dir: recording_dirs::participant_dir(
                    session.session_dir.as_deref(),
                    info.recording_dir.as_deref(),
                ),
            };
            if let Err(e) = session.participants.admit(uid, info.clone()) {
                log::warn!("rejected participant {}: {}", uid, e);
                return Err(e);
            }
            if session.config.is_mixing_enabled {
                self.compositor.lock().participant_joined(uid);
            }
            info
        };
        turn.user_joined(uid, &info);
        Ok(())
    }

    fn on_user_offline(
        &self,
        turn: &DispatchTurn<'_>,
        attempt: u64,
        uid: u32,
        reason: OfflineReason,
    ) -> Result<(), RecordingError> {
        {
            let mut core = self.core.lock();
            if !core.is_current(attempt) {
                return Ok(());
            }
            if core.state != EngineState::Joined {
                return Err(RecordingError::InvalidState(format!(
                    "participant {} reported before the join was confirmed",
                    uid
                )));
            }
            let Some(session) = core.session.as_mut() else {
                return Err(RecordingError::Internal("live state without a session".into()));
            };
            if session.participants.remove(uid).is_none() {
                return Err(RecordingError::Failed(format!("participant {} is not in the channel", uid)));
            }
            if session.config.is_mixing_enabled {
                self.compositor.lock().participant_left(uid);
            }
        }
        turn.user_offline(uid, reason);
        Ok(())
    }

    fn on_audio_frame(
        &self,
        turn: &DispatchTurn<'_>,
        attempt: u64,
        uid: u32,
        frame: AudioFrame,
    ) -> Result<(), RecordingError> {
        {
            let mut core = self.core.lock();
            let Some(session) = joined_session(&mut core, attempt) else {
                return Ok(());
            };
            let wanted = matches!(
                (session.config.decode_audio, &frame),
                (true, AudioFrame::Pcm(_)) | (false, AudioFrame::Aac(_))
            );
            if !wanted {
                log::debug!(
                    "dropping {:?} audio from {}: decode_audio={}",
                    frame.frame_type(),
                    uid,
                    session.config.decode_audio
                );
                return Ok(());
            }
            if !accept_frame(session, uid, MediaKind::Audio, frame.frame_ms()) {
                return Ok(());
            }
        }
        turn.audio_frame(uid, &frame);
        Ok(())
    }

    fn on_video_frame(
        &self,
        turn: &DispatchTurn<'_>,
        attempt: u64,
        uid: u32,
        frame: VideoFrame,
    ) -> Result<(), RecordingError> {
        let (target_uid, delivered) = {
            let mut core = self.core.lock();
            let Some(session) = joined_session(&mut core, attempt) else {
                return Ok(());
            };
            if session.config.is_audio_only {
                log::debug!("dropping video from {}: audio-only session", uid);
                return Ok(());
            }
            let wanted = matches!(
                (session.config.decode_video, &frame.data),
                (true, VideoFrameData::Yuv(_)) | (false, VideoFrameData::H264(_))
            );
            if !wanted {
                log::debug!(
                    "dropping {:?} video from {}: decode_video={}",
                    frame.frame_type(),
                    uid,
                    session.config.decode_video
                );
                return Ok(());
            }
            if !accept_frame(session, uid, MediaKind::Video, frame.frame_ms()) {
                return Ok(());
            }

            let rotation = frame.rotation;
            match frame.data {
                VideoFrameData::Yuv(picture) if session.config.is_mixing_enabled => {
                    let frame_ms = picture.frame_ms;
                    let mut compositor = self.compositor.lock();
                    compositor.submit(uid, picture);
                    if session.last_mixed_ms.is_some_and(|last| frame_ms < last) {
                        return Ok(());
                    }
                    let Some(canvas) = compositor.compose(frame_ms) else {
                        return Ok(());
                    };
                    session.last_mixed_ms = Some(frame_ms);
                    (session.uid, VideoFrame::yuv(canvas))
                }
                data => (uid, VideoFrame { data, rotation }),
            }
        };
        turn.video_frame(target_uid, &delivered);
        Ok(())
    }

    /// Tear down the live session. With `only_attempt`, only if that
    /// attempt is still the current one.
    fn leave(&self, only_attempt: Option<u64>) -> Result<(), RecordingError> {
        let departing = {
            let mut core = self.core.lock();
            self.wait_for_teardown(&mut core);
            match core.state {
                EngineState::Released => return Err(RecordingError::Released),
                EngineState::Idle => return Ok(()),
                // Only seen from a handler on the tearing-down thread. The
                // outer teardown finishes once the handler returns.
                EngineState::Leaving => return Ok(()),
                EngineState::Joining | EngineState::Joined => {}
            }
            if only_attempt.is_some_and(|attempt| attempt != core.attempt) {
                return Ok(());
            }
            core.state = EngineState::Leaving;
            core.tearing_down = true;
            core.attempt += 1;
            core.session
                .as_mut()
                .map(|session| session.participants.drain())
                .unwrap_or_default()
        };
        log::info!("leaving channel, {} participants active", departing.len());

        if let Err(e) = self.transport.lock().close() {
            log::warn!("transport close failed: {}", e);
        }
        self.compositor.lock().clear();

        // Waits for any delivery already in flight; later ones see the
        // bumped attempt and are dropped.
        let turn = self.dispatcher.begin();
        for participant in &departing {
            turn.user_offline(participant.uid, OfflineReason::Quit);
        }
        {
            let mut core = self.core.lock();
            core.session = None;
            core.state = if core.release_pending {
                EngineState::Released
            } else {
                EngineState::Idle
            };
        }
        turn.leave_channel();

        let mut core = self.core.lock();
        core.tearing_down = false;
        core.release_pending = false;
        self.teardown_done.notify_all();
        Ok(())
    }

    /// Block until no teardown is in flight, unless the caller is itself
    /// part of one (a handler running under the dispatch turn).
    fn wait_for_teardown(&self, core: &mut MutexGuard<'_, EngineCore>) {
        while core.tearing_down && !self.dispatcher.holds_turn() {
            self.teardown_done.wait(core);
        }
    }

    fn idle_status(&self, attempt: u64, limit: Duration) -> IdleStatus {
        let core = self.core.lock();
        if !core.is_current(attempt) {
            return IdleStatus::Finished;
        }
        if core.state != EngineState::Joined {
            return IdleStatus::Waiting;
        }
        match core.session.as_ref().and_then(|s| s.participants.idle_for()) {
            Some(idle) if idle >= limit => IdleStatus::Expired,
            _ => IdleStatus::Waiting,
        }
    }

    /// Leave the channel on our own once nobody has been in it for `limit`.
    fn spawn_idle_watchdog(inner: &Arc<Self>, attempt: u64, limit: Duration) {
        let weak = Arc::downgrade(inner);
        let tick = inner.idle.tick;
        let spawned = thread::Builder::new()
            .name("recording-idle-watchdog".into())
            .spawn(move || loop {
                thread::sleep(tick);
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match inner.idle_status(attempt, limit) {
                    IdleStatus::Waiting => {}
                    IdleStatus::Finished => return,
                    IdleStatus::Expired => {
                        log::info!("channel idle for {:?}, leaving", limit);
                        if let Err(e) = inner.leave(Some(attempt)) {
                            log::warn!("idle leave failed: {}", e);
                        }
                        return;
                    }
                }
            });
        if let Err(e) = spawned {
            log::error!("failed to spawn idle watchdog: {}", e);
        }
    }
}

/// The session a frame callback may deliver into: current and joined.
fn joined_session(core: &mut EngineCore, attempt: u64) -> Option<&mut Session> {
    if !core.is_current(attempt) || core.state != EngineState::Joined {
        return None;
    }
    core.session.as_mut()
}

fn accept_frame(session: &mut Session, uid: u32, kind: MediaKind, frame_ms: u32) -> bool {
    match session.participants.accept_frame(uid, kind, frame_ms) {
        FrameVerdict::Deliver => true,
        FrameVerdict::UnknownParticipant => {
            log::debug!("dropping {:?} frame from {}: not in the channel", kind, uid);
            false
        }
        FrameVerdict::OutOfOrder { last_ms } => {
            log::debug!(
                "dropping {:?} frame from {}: {}ms is older than {}ms",
                kind,
                uid,
                frame_ms,
                last_ms
            );
            false
        }
    }
}
