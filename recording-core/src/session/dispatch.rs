use std::cell::Cell;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::models::error::{ErrorCode, WarningCode};
use crate::models::frame::{AudioFrame, VideoFrame};
use crate::models::participant::{OfflineReason, UserJoinInfo};
use crate::traits::event_handler::RecordingEventHandler;

/// Serializes every call into the event handler.
///
/// A caller takes a [`DispatchTurn`] before deciding whether an event is
/// still deliverable, and keeps it until the handler has returned. Teardown
/// takes a turn too, so once it holds one no delivery is in flight. The
/// lock is reentrant: a handler may call back into the engine.
pub struct EventDispatcher {
    handler: Arc<dyn RecordingEventHandler>,
    /// Turn depth of the owning thread.
    gate: ReentrantMutex<Cell<usize>>,
}

impl EventDispatcher {
    pub fn new(handler: Arc<dyn RecordingEventHandler>) -> Self {
        Self {
            handler,
            gate: ReentrantMutex::new(Cell::new(0)),
        }
    }

    /// Wait for any in-flight callback on another thread, then hold the gate.
    pub fn begin(&self) -> DispatchTurn<'_> {
        let guard = self.gate.lock();
        guard.set(guard.get() + 1);
        DispatchTurn {
            guard,
            handler: self.handler.as_ref(),
        }
    }

    /// Whether the calling thread holds a turn, i.e. is inside a handler
    /// callback or a teardown. Such a thread must never wait for another
    /// turn holder.
    pub fn holds_turn(&self) -> bool {
        self.gate.try_lock().is_some_and(|guard| guard.get() > 0)
    }
}

/// Exclusive right to call the handler, held for one event.
pub struct DispatchTurn<'a> {
    guard: ReentrantMutexGuard<'a, Cell<usize>>,
    handler: &'a dyn RecordingEventHandler,
}

impl Drop for DispatchTurn<'_> {
    fn drop(&mut self) {
        self.guard.set(self.guard.get() - 1);
    }
}

impl DispatchTurn<'_> {
    pub fn error(&self, code: ErrorCode) {
        log::error!("session error {:?} ({})", code, code.code());
        self.handler.on_error(code);
    }

    pub fn warning(&self, code: WarningCode) {
        log::warn!("session warning {:?} ({})", code, code.code());
        self.handler.on_warning(code);
    }

    pub fn join_channel_success(&self, channel_id: &str, uid: u32) {
        self.handler.on_join_channel_success(channel_id, uid);
    }

    pub fn leave_channel(&self) {
        self.handler.on_leave_channel();
    }

    pub fn user_joined(&self, uid: u32, info: &UserJoinInfo) {
        log::info!("participant {} joined", uid);
        self.handler.on_user_joined(uid, info);
    }

    pub fn user_offline(&self, uid: u32, reason: OfflineReason) {
        log::info!("participant {} offline: {:?}", uid, reason);
        self.handler.on_user_offline(uid, reason);
    }

    /// Lend `frame` to the handler. It is dropped by the caller right after.
    pub fn audio_frame(&self, uid: u32, frame: &AudioFrame) {
        self.handler.audio_frame_received(uid, frame);
    }

    pub fn video_frame(&self, uid: u32, frame: &VideoFrame) {
        self.handler.video_frame_received(uid, frame);
    }
}
