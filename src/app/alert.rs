use serde::Serialize;

use crate::logwatch::PresenceState;

/// Presentation category for a presence state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// In a call, presenting, or otherwise not to be interrupted
    Busy,
    Away,
    Offline,
    Available,
}

impl AlertLevel {
    pub fn from_state(state: PresenceState) -> Self {
        match state {
            PresenceState::Busy
            | PresenceState::DoNotDisturb
            | PresenceState::OnThePhone
            | PresenceState::Presenting => AlertLevel::Busy,
            PresenceState::Away | PresenceState::BeRightBack => AlertLevel::Away,
            PresenceState::Offline | PresenceState::NewActivity => AlertLevel::Offline,
            PresenceState::Available | PresenceState::Unknown | PresenceState::Start => {
                AlertLevel::Available
            }
        }
    }

    /// Status icon
    pub fn icon(&self) -> &'static str {
        match self {
            AlertLevel::Busy => "●",
            AlertLevel::Away => "◐",
            AlertLevel::Offline => "○",
            AlertLevel::Available => "✓",
        }
    }
}
