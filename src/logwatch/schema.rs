//! Schema definitions for presence observations

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Presence states reported by the chat client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Available,
    Away,
    Busy,
    BeRightBack,
    Offline,
    DoNotDisturb,
    OnThePhone,
    Presenting,
    NewActivity,
    /// A recognized log record carried a state name outside this set
    Unknown,
    /// Nothing has been observed yet
    #[default]
    Start,
}

impl PresenceState {
    /// Map a raw state token from the log to a state.
    ///
    /// Matching is case-insensitive. Any token that does not name a real
    /// presence state resolves to [`PresenceState::Unknown`]; this includes
    /// the literal names of the `Unknown` and `Start` variants, so the
    /// sentinel can never be produced from log text.
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "available" => PresenceState::Available,
            "away" => PresenceState::Away,
            "busy" => PresenceState::Busy,
            "berightback" => PresenceState::BeRightBack,
            "offline" => PresenceState::Offline,
            "donotdisturb" => PresenceState::DoNotDisturb,
            "onthephone" => PresenceState::OnThePhone,
            "presenting" => PresenceState::Presenting,
            "newactivity" => PresenceState::NewActivity,
            _ => PresenceState::Unknown,
        }
    }

    /// Label as shown by the chat client
    pub fn label(&self) -> &'static str {
        match self {
            PresenceState::Available => "Available",
            PresenceState::Away => "Away",
            PresenceState::Busy => "Busy",
            PresenceState::BeRightBack => "Be Right Back",
            PresenceState::Offline => "Offline",
            PresenceState::DoNotDisturb => "Do Not Disturb",
            PresenceState::OnThePhone => "On The Phone",
            PresenceState::Presenting => "Presenting",
            PresenceState::NewActivity => "New Activity",
            PresenceState::Unknown => "Unknown",
            PresenceState::Start => "Start",
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One state observation parsed from a single log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub state: PresenceState,
    /// Keeps the UTC offset written in the log line
    pub observed_at: DateTime<FixedOffset>,
}

impl Transition {
    pub fn new(state: PresenceState, observed_at: DateTime<FixedOffset>) -> Self {
        Self { state, observed_at }
    }
}

/// Externally visible state of a watchdog session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogSnapshot {
    /// Newest observed state
    pub current_state: PresenceState,
    /// State held before the newest observation
    pub previous_state: PresenceState,
    /// Timestamp of the newest observation (session start until the first match)
    pub last_observed: DateTime<FixedOffset>,
    /// Last observation the consumer has acknowledged
    pub acknowledged: DateTime<FixedOffset>,
}

impl WatchdogSnapshot {
    /// Fresh snapshot for a session starting now
    pub fn new() -> Self {
        Self::starting_at(Local::now().fixed_offset())
    }

    /// Fresh snapshot with both timestamps pinned to `at`
    pub fn starting_at(at: DateTime<FixedOffset>) -> Self {
        Self {
            current_state: PresenceState::Start,
            previous_state: PresenceState::Start,
            last_observed: at,
            acknowledged: at,
        }
    }

    /// True while the newest observation has not been acknowledged.
    ///
    /// Compares timestamps, not states: the same state seen again at a new
    /// time still counts as a change.
    pub fn has_changed(&self) -> bool {
        self.acknowledged != self.last_observed
    }

    /// Record a new observation, shifting the current state into `previous_state`
    pub fn record(&mut self, transition: Transition) {
        self.previous_state = self.current_state;
        self.current_state = transition.state;
        self.last_observed = transition.observed_at;
    }

    /// Mark the newest observation as consumed
    pub fn acknowledge(&mut self) {
        self.acknowledged = self.last_observed;
    }
}

impl Default for WatchdogSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, offset_secs: i32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_secs)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 14, hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_from_token_case_insensitive() {
        assert_eq!(PresenceState::from_token("Busy"), PresenceState::Busy);
        assert_eq!(PresenceState::from_token("BUSY"), PresenceState::Busy);
        assert_eq!(PresenceState::from_token("BeRightBack"), PresenceState::BeRightBack);
        assert_eq!(PresenceState::from_token("doNotDisturb"), PresenceState::DoNotDisturb);
        assert_eq!(PresenceState::from_token("OnThePhone"), PresenceState::OnThePhone);
        assert_eq!(PresenceState::from_token("NewActivity"), PresenceState::NewActivity);
    }

    #[test]
    fn test_from_token_falls_back_to_unknown() {
        assert_eq!(PresenceState::from_token("Meditating"), PresenceState::Unknown);
        assert_eq!(PresenceState::from_token(""), PresenceState::Unknown);
        // The sentinel is never produced from log text
        assert_eq!(PresenceState::from_token("Start"), PresenceState::Unknown);
    }

    #[test]
    fn test_labels() {
        assert_eq!(PresenceState::BeRightBack.to_string(), "Be Right Back");
        assert_eq!(PresenceState::DoNotDisturb.label(), "Do Not Disturb");
        assert_eq!(PresenceState::default(), PresenceState::Start);
    }

    #[test]
    fn test_fresh_snapshot_has_no_change() {
        let snapshot = WatchdogSnapshot::new();
        assert_eq!(snapshot.current_state, PresenceState::Start);
        assert_eq!(snapshot.previous_state, PresenceState::Start);
        assert!(!snapshot.has_changed());
    }

    #[test]
    fn test_same_state_at_new_time_is_a_change() {
        let mut snapshot = WatchdogSnapshot::starting_at(at(8, 0));
        snapshot.record(Transition::new(PresenceState::Busy, at(9, 0)));
        snapshot.acknowledge();
        assert!(!snapshot.has_changed());

        snapshot.record(Transition::new(PresenceState::Busy, at(10, 0)));
        assert!(snapshot.has_changed());
        assert_eq!(snapshot.previous_state, PresenceState::Busy);
        assert_eq!(snapshot.current_state, PresenceState::Busy);
    }

    #[test]
    fn test_timestamps_compare_by_instant() {
        // 09:00+02:00 and 07:00Z are the same instant
        let mut snapshot = WatchdogSnapshot::starting_at(at(8, 0));
        snapshot.record(Transition::new(PresenceState::Away, at(9, 2 * 3600)));
        snapshot.acknowledge();
        snapshot.record(Transition::new(PresenceState::Away, at(7, 0)));
        assert!(!snapshot.has_changed());
    }

    #[test]
    fn test_acknowledge_is_idempotent() {
        let mut snapshot = WatchdogSnapshot::starting_at(at(8, 0));
        snapshot.record(Transition::new(PresenceState::Away, at(9, 0)));
        snapshot.acknowledge();
        snapshot.acknowledge();
        assert!(!snapshot.has_changed());
        assert_eq!(snapshot.acknowledged, at(9, 0));
    }
}
