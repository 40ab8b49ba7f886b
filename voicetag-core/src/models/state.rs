use std::path::PathBuf;

use super::card::CardUid;

/// Recording session state machine.
///
/// State transitions:
/// ```text
/// idle ──card present──→ card_detected ──confirm──→ recording
///   ↑                         │                        │
///   └──────deny / removed─────┘                        │
///   └────────────────────stop (or removal policy)──────┘
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    CardDetected { uid: CardUid },
    Recording {
        uid: Option<CardUid>,
        file_path: PathBuf,
    },
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    /// UID of the card that drove this state, if any.
    pub fn card(&self) -> Option<&CardUid> {
        match self {
            Self::CardDetected { uid } => Some(uid),
            Self::Recording { uid, .. } => uid.as_ref(),
            Self::Idle => None,
        }
    }

    /// Short label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CardDetected { .. } => "card detected",
            Self::Recording { .. } => "recording",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_is_reported_per_state() {
        let uid = CardUid::new(&[1, 2, 3, 4]).unwrap();
        assert!(SessionState::Idle.card().is_none());
        assert_eq!(
            SessionState::CardDetected { uid: uid.clone() }.card(),
            Some(&uid)
        );
        let manual = SessionState::Recording {
            uid: None,
            file_path: PathBuf::from("manual.wav"),
        };
        assert!(manual.card().is_none());
        assert!(manual.is_recording());
        assert_eq!(manual.label(), "recording");
    }
}
