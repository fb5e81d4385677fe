/// Recording engine state machine.
///
/// State transitions:
/// ```text
/// idle → joining → joined → leaving → idle
///          ↓
///         idle            (join failed or cancelled)
///
/// any → released          (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Idle,
    Joining,
    Joined,
    Leaving,
    Released,
}

impl EngineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined)
    }

    /// Whether a session exists (join pending or confirmed).
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Joining | Self::Joined)
    }

    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_classify_every_state() {
        let all = [
            EngineState::Idle,
            EngineState::Joining,
            EngineState::Joined,
            EngineState::Leaving,
            EngineState::Released,
        ];
        let idle: Vec<_> = all.iter().filter(|s| s.is_idle()).collect();
        let live: Vec<_> = all.iter().filter(|s| s.is_live()).collect();
        assert_eq!(idle, vec![&EngineState::Idle]);
        assert_eq!(live, vec![&EngineState::Joining, &EngineState::Joined]);
        assert!(EngineState::Joined.is_joined());
        assert!(!EngineState::Leaving.is_joined());
        assert!(EngineState::Released.is_released());
    }
}
