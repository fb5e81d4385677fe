use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::models::error::RecordingError;
use crate::models::participant::{Participant, UserJoinInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Outcome of checking a frame against the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict {
    Deliver,
    UnknownParticipant,
    /// Older than the last frame delivered on the same stream.
    OutOfOrder { last_ms: u32 },
}

#[derive(Debug)]
struct Entry {
    info: UserJoinInfo,
    last_audio_ms: Option<u32>,
    last_video_ms: Option<u32>,
}

/// The active participant set of one session, plus per-stream timestamp
/// history used to keep delivery in non-decreasing order.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    entries: BTreeMap<u32, Entry>,
    empty_since: Option<Instant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the idle clock if nobody is here yet.
    pub fn start_idle_clock(&mut self) {
        if self.entries.is_empty() {
            self.empty_since = Some(Instant::now());
        }
    }

    /// How long the set has been empty, if it is.
    pub fn idle_for(&self) -> Option<Duration> {
        self.empty_since.map(|since| since.elapsed())
    }

    pub fn admit(&mut self, uid: u32, info: UserJoinInfo) -> Result<(), RecordingError> {
        if self.entries.contains_key(&uid) {
            return Err(RecordingError::DuplicateParticipant(uid));
        }
        self.entries.insert(
            uid,
            Entry {
                info,
                last_audio_ms: None,
                last_video_ms: None,
            },
        );
        self.empty_since = None;
        Ok(())
    }

    pub fn remove(&mut self, uid: u32) -> Option<Participant> {
        let entry = self.entries.remove(&uid)?;
        if self.entries.is_empty() {
            self.empty_since = Some(Instant::now());
        }
        Some(Participant { uid, info: entry.info })
    }

    /// Empty the set, returning everyone who was in it (ascending uid).
    pub fn drain(&mut self) -> Vec<Participant> {
        self.empty_since = None;
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(uid, entry)| Participant { uid, info: entry.info })
            .collect()
    }

    pub fn contains(&self, uid: u32) -> bool {
        self.entries.contains_key(&uid)
    }

    pub fn uids(&self) -> Vec<u32> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check a frame and, when it may be delivered, record its timestamp.
    pub fn accept_frame(&mut self, uid: u32, kind: MediaKind, frame_ms: u32) -> FrameVerdict {
        let Some(entry) = self.entries.get_mut(&uid) else {
            return FrameVerdict::UnknownParticipant;
        };
        let last = match kind {
            MediaKind::Audio => &mut entry.last_audio_ms,
            MediaKind::Video => &mut entry.last_video_ms,
        };
        match *last {
            Some(last_ms) if frame_ms < last_ms => FrameVerdict::OutOfOrder { last_ms },
            _ => {
                *last = Some(frame_ms);
                FrameVerdict::Deliver
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_admission_is_rejected() {
        let mut registry = ParticipantRegistry::new();
        registry.admit(1, UserJoinInfo::default()).unwrap();
        assert_eq!(
            registry.admit(1, UserJoinInfo::default()),
            Err(RecordingError::DuplicateParticipant(1))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn frames_must_not_go_back_in_time() {
        let mut registry = ParticipantRegistry::new();
        registry.admit(7, UserJoinInfo::default()).unwrap();
        assert_eq!(registry.accept_frame(7, MediaKind::Audio, 100), FrameVerdict::Deliver);
        assert_eq!(registry.accept_frame(7, MediaKind::Audio, 100), FrameVerdict::Deliver);
        assert_eq!(
            registry.accept_frame(7, MediaKind::Audio, 80),
            FrameVerdict::OutOfOrder { last_ms: 100 }
        );
        // Video has its own history.
        assert_eq!(registry.accept_frame(7, MediaKind::Video, 80), FrameVerdict::Deliver);
        assert_eq!(registry.accept_frame(8, MediaKind::Video, 80), FrameVerdict::UnknownParticipant);
    }

    #[test]
    fn readmission_resets_history() {
        let mut registry = ParticipantRegistry::new();
        registry.admit(7, UserJoinInfo::default()).unwrap();
        registry.accept_frame(7, MediaKind::Video, 500);
        let gone = registry.remove(7).unwrap();
        assert_eq!(gone.uid, 7);
        assert_eq!(registry.accept_frame(7, MediaKind::Video, 600), FrameVerdict::UnknownParticipant);

        registry.admit(7, UserJoinInfo::default()).unwrap();
        assert_eq!(registry.accept_frame(7, MediaKind::Video, 10), FrameVerdict::Deliver);
    }

    #[test]
    fn idle_clock_follows_occupancy() {
        let mut registry = ParticipantRegistry::new();
        assert!(registry.idle_for().is_none());
        registry.start_idle_clock();
        assert!(registry.idle_for().is_some());

        registry.admit(1, UserJoinInfo::default()).unwrap();
        assert!(registry.contains(1));
        assert!(registry.idle_for().is_none());

        registry.remove(1);
        assert!(!registry.contains(1));
        assert!(registry.idle_for().is_some());
    }

    #[test]
    fn drain_returns_everyone_in_uid_order() {
        let mut registry = ParticipantRegistry::new();
        for uid in [3, 1, 2] {
            registry.admit(uid, UserJoinInfo::default()).unwrap();
        }
        let uids: Vec<u32> = registry.drain().into_iter().map(|p| p.uid).collect();
        assert_eq!(uids, vec![1, 2, 3]);
        assert!(registry.is_empty());
    }
}
